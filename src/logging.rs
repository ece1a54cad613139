//! tracing subscriber setup for the CLI
//!
//! library code only emits events; the binary decides where they go.
//! `RUST_LOG` always wins over the flag-derived filter.

use std::io::IsTerminal;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT_ONCE: Once = Once::new();

/// filter used when `RUST_LOG` is unset
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "smart_sections=debug"
    } else {
        "warn"
    }
}

/// install a stderr subscriber; later calls are no-ops
pub fn init(debug: bool) {
    INIT_ONCE.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

        // another subscriber may already be installed (tests, embedding apps)
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(false)
            .try_init();
    });
}
