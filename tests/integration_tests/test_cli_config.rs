// integration tests for the config command

use std::fs;

use serde_json::json;

use crate::common::*;

#[test]
fn test_config_path_uses_override() {
    let dir = create_test_dir();
    let path = dir.path().join("custom.json");

    let output = run(&["--no-json", "--config", path.to_str().unwrap(), "config", "path"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), path.to_str().unwrap());
}

#[test]
fn test_config_path_uses_env_var() {
    let dir = create_test_dir();
    let path = dir.path().join("from_env.json");

    let output = run_with_config(&["--no-json", "config", "path"], &path);
    assert_eq!(stdout(&output).trim(), path.to_str().unwrap());
}

#[test]
fn test_config_show_defaults_when_missing() {
    let output = run(&["-j", "config", "show"]);

    assert!(output.status.success());
    let json = json_output(&output);
    assert_eq!(json["result"]["settings"]["debug"], false);
    assert_eq!(json["result"]["settings"]["editor_marker"], "elementor-preview");
    assert_eq!(json["result"]["scripts"]["enabled"], true);
    assert_eq!(json["result"]["scripts"]["max_len"], 1024);
}

#[test]
fn test_config_init_writes_defaults() {
    let dir = create_test_dir();
    let path = dir.path().join("nested").join("config.json");

    let output = run_with_config(&["--no-json", "config", "init"], &path);
    assert!(output.status.success(), "stderr={}", stderr(&output));
    assert!(path.exists());

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["settings"]["default_language"], "en");
    assert_eq!(written["scripts"]["max_depth"], 32);

    // refuses to overwrite without --force
    let output = run_with_config(&["--no-json", "config", "init"], &path);
    assert_eq!(output.status.code(), Some(5));
    assert!(stderr(&output).contains("already exists"));

    let output = run_with_config(&["--no-json", "config", "init", "--force"], &path);
    assert!(output.status.success());
}

#[test]
fn test_config_set_then_show() {
    let dir = create_test_dir();
    let path = dir.path().join("config.json");

    let output = run_with_config(&["--no-json", "config", "set", "scripts.enabled", "off"], &path);
    assert!(output.status.success(), "stderr={}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "Set scripts.enabled = off");

    let output = run_with_config(&["-j", "config", "show"], &path);
    assert_eq!(json_output(&output)["result"]["scripts"]["enabled"], false);
}

#[test]
fn test_config_set_unknown_key() {
    let dir = create_test_dir();
    let path = dir.path().join("config.json");

    let output = run_with_config(&["-j", "config", "set", "settings.theme", "dark"], &path);
    assert_eq!(output.status.code(), Some(4));
    assert!(!path.exists());
}

#[test]
fn test_config_verify_valid() {
    let dir = create_test_dir();
    let path = write_json(
        dir.path(),
        "config.json",
        &json!({ "settings": { "debug": true }, "scripts": { "max_depth": 16 } }),
    );

    let output = run_with_config(&["--no-json", "config", "verify"], &path);
    assert!(output.status.success(), "stderr={}", stderr(&output));
    assert!(stdout(&output).contains("Configuration is valid"));
}

#[test]
fn test_config_verify_accepts_comments() {
    let dir = create_test_dir();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        "{\n  // keep expressions short\n  \"scripts\": { \"max_len\": 256, },\n}\n",
    )
    .unwrap();

    let output = run_with_config(&["-j", "config", "verify"], &path);
    assert!(output.status.success(), "stderr={}", stderr(&output));
    assert_eq!(json_output(&output)["result"]["valid"], true);
}

#[test]
fn test_config_verify_reports_errors() {
    let dir = create_test_dir();
    let path = write_json(
        dir.path(),
        "config.json",
        &json!({ "settings": { "editor_marker": "" }, "scripts": { "max_depth": 0 } }),
    );

    let output = run_with_config(&["-j", "config", "verify"], &path);
    assert_eq!(output.status.code(), Some(5));

    let json = json_output(&output);
    assert_eq!(json["error"]["code"], -32005);
    let details = json["error"]["data"]["details"].as_array().unwrap();
    assert_eq!(details.len(), 2);
}

#[test]
fn test_config_verify_missing_file() {
    let dir = create_test_dir();
    let output = run_with_config(
        &["--no-json", "config", "verify"],
        &dir.path().join("absent.json"),
    );
    assert_eq!(output.status.code(), Some(5));
    assert!(stderr(&output).contains("not found"));
}

#[test]
fn test_broken_config_fails_eval() {
    let dir = create_test_dir();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ scripts: [ }").unwrap();

    let output = run_with_stdin(&["-j", "eval", "-"], "null");
    // no config: fine
    assert!(output.status.success());

    let output = run_with_config(&["-j", "--config", path.to_str().unwrap(), "eval", "/dev/null"], &path);
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_oversized_script_budget_rejected_and_long_chain_hidden() {
    let dir = create_test_dir();
    let config = dir.path().join("config.json");

    let output = run_with_config(
        &["-q", "config", "set", "scripts.max_len", "2000000"],
        &config,
    );
    assert!(output.status.success(), "stderr={}", stderr(&output));

    let output = run_with_config(&["-j", "config", "verify"], &config);
    assert_eq!(output.status.code(), Some(5));
    let details = json_output(&output)["error"]["data"]["details"].clone();
    assert_eq!(details[0], "scripts.max_len: 2000000 out of range (1-65536)");

    // the oversized budget still cannot blow the stack
    let chain = format!("{}true", "false||".repeat(200_000));
    let rules = write_json(
        dir.path(),
        "rules.json",
        &json!([{ "logic": "AND", "conditions": [
            { "type": "custom_js", "operator": "returns_true", "value": chain }
        ]}]),
    );
    let output = run_with_config(&["-j", "eval", rules.to_str().unwrap()], &config);
    assert!(output.status.success(), "stderr={}", stderr(&output));
    assert_eq!(json_output(&output)["result"]["visible"], false);
}
