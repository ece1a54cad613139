use serde::{Deserialize, Serialize};

use crate::conditions::expr::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_LEN};
use crate::conditions::{Evaluator, ExprLimits, ScriptPolicy};
use crate::context::{ContextBuilder, DEFAULT_EDITOR_MARKER, DEFAULT_LANGUAGE};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub scripts: Scripts,
}

impl Config {
    /// evaluator honoring the script policy; `debug` forces debug logging on
    pub fn evaluator(&self, debug: bool) -> Evaluator {
        Evaluator::new(debug || self.settings.debug).with_script_policy(self.scripts.policy())
    }

    /// context builder preloaded with the configured defaults
    pub fn context_defaults(&self) -> ContextBuilder {
        ContextBuilder::default()
            .with_editor_marker(self.settings.editor_marker.clone())
            .with_default_language(self.settings.default_language.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// log every condition evaluation
    #[serde(default)]
    pub debug: bool,
    /// URL fragment that marks page builder previews
    #[serde(default = "default_editor_marker")]
    pub editor_marker: String,
    /// language assumed when the visitor sends none
    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_editor_marker() -> String {
    DEFAULT_EDITOR_MARKER.to_string()
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            editor_marker: default_editor_marker(),
            default_language: default_language(),
        }
    }
}

/// handling of `custom_js` conditions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scripts {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// maximum expression length in characters
    #[serde(default = "default_max_len")]
    pub max_len: usize,
    /// maximum expression nesting depth
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_max_len() -> usize {
    DEFAULT_MAX_LEN
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for Scripts {
    fn default() -> Self {
        Self {
            enabled: true,
            max_len: DEFAULT_MAX_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Scripts {
    pub fn limits(&self) -> ExprLimits {
        ExprLimits {
            max_len: self.max_len,
            max_depth: self.max_depth,
        }
    }

    pub fn policy(&self) -> ScriptPolicy {
        ScriptPolicy {
            enabled: self.enabled,
            limits: self.limits(),
        }
    }
}
