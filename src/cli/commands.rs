use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;

use crate::conditions::{check_rules, parse_rules_str, RuleTree};
use crate::config::{self, Config};
use crate::context::{Browser, Context, ContextBuilder, Device};
use crate::logging;

use super::exit_codes;
use super::output::{self, CheckData, DetectData, EvalData, OutputMode};

#[derive(Parser)]
#[command(name = "smart-sections")]
#[command(about = "Evaluate smart section visibility rules against a visitor context")]
#[command(version)]
pub struct Cli {
    /// Path to config file (overrides SMART_SECTIONS_CONFIG env var and default location)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output in JSON format (auto-enabled when stdout is piped)
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Force text output even when stdout is piped
    #[arg(long, global = true, conflicts_with = "json")]
    pub no_json: bool,

    /// Suppress all output on success (errors still go to stderr)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log every condition evaluation to stderr
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decide whether a section with the given rules is visible
    Eval {
        /// Rule file (JSON), or "-" to read from stdin
        rules: String,

        #[command(flatten)]
        context: ContextArgs,

        /// Show the result of every group and condition
        #[arg(long)]
        trace: bool,

        /// Exit with status 2 when the section is hidden
        #[arg(long)]
        exit_status: bool,
    },

    /// Check a rule file for unknown types, bad operators and malformed values
    Check {
        /// Rule file (JSON), or "-" to read from stdin
        rules: String,
    },

    /// Classify a user agent string
    Detect {
        /// User agent string, or "-" to read from stdin
        #[arg(short, long)]
        user_agent: String,
    },

    /// Show the context rules would be evaluated against
    Context {
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// visitor facts; each flag overrides the same value from --context
#[derive(Args, Debug, Default)]
pub struct ContextArgs {
    /// JSON file with context values (camelCase keys, all optional)
    #[arg(long = "context", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Page path, e.g. /pricing
    #[arg(long)]
    pub url: Option<String>,

    /// Full page URL; supplies the path and editor mode when not given
    #[arg(long)]
    pub href: Option<String>,

    /// User agent used to detect device and browser
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Device class: desktop, mobile, or tablet
    #[arg(long)]
    pub device: Option<String>,

    /// Browser: chrome, firefox, safari, edge, or unknown
    #[arg(long)]
    pub browser: Option<String>,

    /// Language tag, e.g. en or de-AT
    #[arg(long)]
    pub language: Option<String>,

    /// Referring URL
    #[arg(long)]
    pub referrer: Option<String>,

    /// Time of day, HH:MM (24-hour); defaults to now
    #[arg(long)]
    pub time: Option<String>,

    /// Visitor is logged in
    #[arg(long)]
    pub logged_in: bool,

    /// Page is rendered inside the editor
    #[arg(long)]
    pub editor_mode: bool,
}

impl ContextArgs {
    fn to_builder(&self) -> ContextBuilder {
        let mut builder = ContextBuilder::default();
        builder.url = self.url.clone();
        builder.href = self.href.clone();
        builder.user_agent = self.user_agent.clone();
        builder.device = self.device.clone();
        builder.browser = self.browser.clone();
        builder.language = self.language.clone();
        builder.referrer = self.referrer.clone();
        builder.current_time = self.time.clone();
        builder.is_logged_in = self.logged_in.then_some(true);
        builder.is_editor_mode = self.editor_mode.then_some(true);
        builder
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "scripts.enabled")
        key: String,
        /// Value to set
        value: String,
    },
    /// Verify configuration file for errors
    Verify,
}

/// print an error in the current output mode and exit
fn fail(output_mode: OutputMode, code: i32, message: &str, details: Vec<String>) -> ! {
    if output_mode.is_json() {
        output::print_json_error_with_details(code, message, details);
    } else {
        eprintln!("Error: {}", message);
        for detail in &details {
            eprintln!("  - {}", detail);
        }
    }
    std::process::exit(code);
}

/// load the config, exiting with CONFIG_ERROR when it is unusable
fn load_config(config_path: Option<&str>, output_mode: OutputMode) -> Config {
    let loaded = config::get_config_path(config_path).and_then(|path| config::load_from(&path));
    match loaded {
        Ok(config) => config,
        Err(e) => fail(output_mode, exit_codes::CONFIG_ERROR, &format!("{:#}", e), vec![]),
    }
}

/// read a file, or stdin when the path is "-"
fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("failed to read from stdin")?;
        Ok(input)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))
    }
}

/// read and parse a rule file, exiting with RULES_ERROR on failure
fn load_rules(path: &str, output_mode: OutputMode) -> RuleTree {
    let parsed = read_input(path).and_then(|text| {
        parse_rules_str(&text).with_context(|| format!("invalid rules in {}", path))
    });
    match parsed {
        Ok(tree) => tree,
        Err(e) => fail(output_mode, exit_codes::RULES_ERROR, &format!("{:#}", e), vec![]),
    }
}

/// merge config defaults, the context file and flags into a context
fn build_context(args: &ContextArgs, config: &Config) -> Result<Context> {
    let mut builder = config.context_defaults();

    if let Some(file) = &args.file {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read context file {}", file.display()))?;
        let from_file: ContextBuilder = serde_json::from_str(&text)
            .with_context(|| format!("invalid context file {}", file.display()))?;
        builder = builder.merge(from_file);
    }

    Ok(builder.merge(args.to_builder()).build()?)
}

fn context_or_exit(args: &ContextArgs, config: &Config, output_mode: OutputMode) -> Context {
    match build_context(args, config) {
        Ok(ctx) => ctx,
        Err(e) => fail(output_mode, exit_codes::INVALID_ARGS, &format!("{:#}", e), vec![]),
    }
}

pub fn execute(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    let output_mode = OutputMode::from_flags(cli.json, cli.no_json, cli.quiet);

    match cli.command {
        Commands::Eval {
            rules,
            context,
            trace,
            exit_status,
        } => {
            let config = load_config(config_path, output_mode);
            logging::init(cli.debug || config.settings.debug);

            let tree = load_rules(&rules, output_mode);
            let ctx = context_or_exit(&context, &config, output_mode);
            let evaluator = config.evaluator(cli.debug);

            let (visible, groups) = if trace {
                let t = evaluator.trace_section(Some(&tree), &ctx);
                (t.visible, Some(t.groups))
            } else {
                (evaluator.evaluate_section(Some(&tree), &ctx), None)
            };

            match output_mode {
                OutputMode::Json => output::print_json(&EvalData {
                    visible,
                    trace: groups,
                }),
                OutputMode::Text => {
                    if let Some(groups) = &groups {
                        for (i, group) in groups.iter().enumerate() {
                            let status = match (group.enabled, group.passed) {
                                (false, _) => "skipped (disabled)",
                                (true, true) => "passed",
                                (true, false) => "failed",
                            };
                            println!("group {} [{}]: {}", i, group.logic, status);
                            for detail in &group.details {
                                let mark = if !detail.enabled {
                                    "-"
                                } else if detail.result {
                                    "✓"
                                } else {
                                    "✗"
                                };
                                println!("  {} {} ({})", mark, detail.condition, detail.reason);
                            }
                        }
                    }
                    println!("{}", if visible { "visible" } else { "hidden" });
                }
                OutputMode::Quiet => {}
            }

            if exit_status && !visible {
                std::process::exit(exit_codes::HIDDEN);
            }
            Ok(())
        }

        Commands::Check { rules } => {
            let config = load_config(config_path, output_mode);
            logging::init(cli.debug || config.settings.debug);

            let tree = load_rules(&rules, output_mode);
            let issues = check_rules(&tree, &config.scripts.limits());
            let conditions = tree.groups.iter().map(|g| g.conditions.len()).sum();

            if issues.is_empty() {
                match output_mode {
                    OutputMode::Json => output::print_json(&CheckData {
                        valid: true,
                        groups: tree.groups.len(),
                        conditions,
                        issues,
                    }),
                    OutputMode::Text => println!(
                        "✓ Rules are valid: {} group(s), {} condition(s)",
                        tree.groups.len(),
                        conditions
                    ),
                    OutputMode::Quiet => {}
                }
                return Ok(());
            }

            let message = format!("{} problem(s) found in {}", issues.len(), rules);
            let details = issues.iter().map(|i| i.to_string()).collect();
            fail(output_mode, exit_codes::RULES_ERROR, &message, details)
        }

        Commands::Detect { user_agent } => {
            logging::init(cli.debug);

            let user_agent = if user_agent == "-" {
                read_input("-")?.trim().to_string()
            } else {
                user_agent
            };
            let data = DetectData {
                device: Device::detect(&user_agent),
                browser: Browser::detect(&user_agent),
            };

            match output_mode {
                OutputMode::Json => output::print_json(&data),
                OutputMode::Text => {
                    println!("device:  {}", data.device);
                    println!("browser: {}", data.browser);
                }
                OutputMode::Quiet => {}
            }
            Ok(())
        }

        Commands::Context { context } => {
            let config = load_config(config_path, output_mode);
            logging::init(cli.debug || config.settings.debug);

            let ctx = context_or_exit(&context, &config, output_mode);
            match output_mode {
                OutputMode::Json => output::print_json(&ctx),
                OutputMode::Text => {
                    let json =
                        serde_json::to_string_pretty(&ctx).context("Failed to serialize context")?;
                    println!("{}", json);
                }
                OutputMode::Quiet => {}
            }
            Ok(())
        }

        Commands::Config { command } => {
            logging::init(cli.debug);
            execute_config(command, config_path, output_mode)
        }
    }
}

fn execute_config(
    command: ConfigCommands,
    config_path: Option<&str>,
    output_mode: OutputMode,
) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = load_config(config_path, output_mode);
            if output_mode.is_json() {
                output::print_json(&config);
            } else {
                let json =
                    serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
                println!("{}", json);
            }
            Ok(())
        }
        ConfigCommands::Path => {
            let path = config::get_config_path(config_path)?;
            if output_mode.is_json() {
                output::print_json(&serde_json::json!({ "path": path }));
            } else {
                println!("{}", path.display());
            }
            Ok(())
        }
        ConfigCommands::Init { force } => {
            let path = config::get_config_path(config_path)?;
            if path.exists() && !force {
                fail(
                    output_mode,
                    exit_codes::CONFIG_ERROR,
                    &format!(
                        "config file already exists: {} (use --force to overwrite)",
                        path.display()
                    ),
                    vec![],
                );
            }
            config::save_to(&Config::default(), &path)?;
            if !output_mode.is_quiet() {
                if output_mode.is_json() {
                    output::print_json(&serde_json::json!({ "path": path }));
                } else {
                    println!("Wrote default configuration to {}", path.display());
                }
            }
            Ok(())
        }
        ConfigCommands::Set { key, value } => {
            let path = config::get_config_path(config_path)?;
            let mut config = load_config(config_path, output_mode);
            if let Err(e) = config::set_value(&mut config, &key, &value) {
                fail(output_mode, exit_codes::INVALID_ARGS, &e.to_string(), vec![]);
            }
            config::save_to(&config, &path)?;
            if output_mode == OutputMode::Text {
                println!("Set {} = {}", key, value);
            }
            Ok(())
        }
        ConfigCommands::Verify => {
            let path = config::get_config_path(config_path)?;
            let errors = match config::verify(&path) {
                Ok(errors) => errors,
                Err(e) => fail(output_mode, exit_codes::CONFIG_ERROR, &format!("{:#}", e), vec![]),
            };

            if errors.is_empty() {
                match output_mode {
                    OutputMode::Json => {
                        output::print_json(&serde_json::json!({ "valid": true, "path": path }))
                    }
                    OutputMode::Text => {
                        println!("✓ Configuration is valid: {}", path.display())
                    }
                    OutputMode::Quiet => {}
                }
                return Ok(());
            }

            let message = format!(
                "configuration has {} error(s): {}",
                errors.len(),
                path.display()
            );
            fail(output_mode, exit_codes::CONFIG_ERROR, &message, errors)
        }
    }
}
