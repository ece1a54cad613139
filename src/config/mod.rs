mod schema;

pub use schema::{Config, Scripts, Settings};

use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::conditions::expr::MAX_DEPTH_LIMIT;

const CONFIG_ENV_VAR: &str = "SMART_SECTIONS_CONFIG";

/// upper bound accepted for `scripts.max_len`
const MAX_LEN_LIMIT: usize = 65_536;

/// resolve the config path: explicit override, then env var, then
/// ~/.smart-sections/config.json
pub fn get_config_path(override_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(PathBuf::from(shellexpand::tilde(path.trim()).to_string()));
    }

    if let Ok(path) = env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(path.trim()).to_string()));
        }
    }

    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not find home directory"))?
        .join(".smart-sections")
        .join("config.json"))
}

/// load config from a path; a missing file yields defaults
pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// parse config text; strict JSON first, then JSON5 (comments, trailing commas)
pub fn parse(content: &str) -> Result<Config> {
    match serde_json::from_str(content) {
        Ok(config) => Ok(config),
        Err(json_err) => json5::from_str(content).map_err(|_| anyhow!("invalid JSON: {}", json_err)),
    }
}

pub fn save_to(config: &Config, path: &Path) -> Result<()> {
    // ensure directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    let content = serde_json::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}

/// Verify configuration file and return a list of errors
pub fn verify(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(anyhow!("config file not found: {}", path.display()));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config = parse(&content)?;
    Ok(validate(&config))
}

/// check values that deserialize fine but cannot be used
pub fn validate(config: &Config) -> Vec<String> {
    let mut errors = Vec::new();

    let language = config.settings.default_language.trim();
    let valid_tag = language
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c == '-' || c == '_');
    if language.is_empty() || !valid_tag {
        errors.push(format!(
            "settings.default_language: invalid language tag '{}'",
            config.settings.default_language
        ));
    }

    if config.settings.editor_marker.trim().is_empty() {
        errors.push(
            "settings.editor_marker: must not be empty (editor mode could never be detected)"
                .to_string(),
        );
    }

    if config.scripts.max_len == 0 || config.scripts.max_len > MAX_LEN_LIMIT {
        errors.push(format!(
            "scripts.max_len: {} out of range (1-{})",
            config.scripts.max_len, MAX_LEN_LIMIT
        ));
    }

    if config.scripts.max_depth == 0 || config.scripts.max_depth > MAX_DEPTH_LIMIT {
        errors.push(format!(
            "scripts.max_depth: {} out of range (1-{})",
            config.scripts.max_depth, MAX_DEPTH_LIMIT
        ));
    }

    errors
}

pub fn set_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["settings", "debug"] => {
            config.settings.debug = parse_bool(value)?;
        }
        ["settings", "editor_marker"] => {
            config.settings.editor_marker = value.to_string();
        }
        ["settings", "default_language"] => {
            config.settings.default_language = value.to_string();
        }
        ["scripts", "enabled"] => {
            config.scripts.enabled = parse_bool(value)?;
        }
        ["scripts", "max_len"] => {
            config.scripts.max_len = value
                .parse()
                .with_context(|| format!("Invalid number: {}", value))?;
        }
        ["scripts", "max_depth"] => {
            config.scripts.max_depth = value
                .parse()
                .with_context(|| format!("Invalid number: {}", value))?;
        }
        _ => {
            return Err(anyhow!(
                "Unknown config key: {}. Valid keys: settings.debug, settings.editor_marker, \
                 settings.default_language, scripts.enabled, scripts.max_len, scripts.max_depth",
                key
            ));
        }
    }

    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(anyhow!(
            "Invalid boolean value: {}. Use true/false, yes/no, 1/0, or on/off",
            value
        )),
    }
}
