// integration tests for the eval command

use serde_json::json;

use crate::common::*;

fn pricing_rules() -> serde_json::Value {
    json!({
        "version": "2.0",
        "groups": [{
            "logic": "AND",
            "enabled": true,
            "conditions": [
                { "type": "page_url", "operator": "contains", "value": "pricing", "enabled": true },
                { "type": "device", "operator": "is", "value": "mobile", "enabled": true }
            ]
        }]
    })
}

#[test]
fn test_eval_visible_json() {
    let dir = create_test_dir();
    let rules = write_json(dir.path(), "rules.json", &pricing_rules());

    let output = run(&[
        "-j",
        "eval",
        rules.to_str().unwrap(),
        "--url",
        "/pricing",
        "--device",
        "mobile",
    ]);

    assert!(output.status.success(), "stderr={}", stderr(&output));
    let json = json_output(&output);
    assert_eq!(json["jsonrpc"], "2.0");
    assert_eq!(json["result"]["visible"], true);
    assert!(json["id"].is_null());
    assert!(json["result"].get("trace").is_none());
}

#[test]
fn test_eval_hidden_text() {
    let dir = create_test_dir();
    let rules = write_json(dir.path(), "rules.json", &pricing_rules());

    let output = run(&[
        "--no-json",
        "eval",
        rules.to_str().unwrap(),
        "--url",
        "/pricing",
        "--device",
        "desktop",
    ]);

    // hidden is still a successful run without --exit-status
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "hidden");
}

#[test]
fn test_eval_exit_status() {
    let dir = create_test_dir();
    let rules = write_json(dir.path(), "rules.json", &pricing_rules());
    let path = rules.to_str().unwrap();

    let hidden = run(&["-q", "eval", path, "--url", "/about", "--exit-status"]);
    assert_eq!(hidden.status.code(), Some(2));
    assert!(stdout(&hidden).is_empty());

    let visible = run(&[
        "-q",
        "eval",
        path,
        "--url",
        "/pricing",
        "--device",
        "mobile",
        "--exit-status",
    ]);
    assert_eq!(visible.status.code(), Some(0));
}

#[test]
fn test_eval_trace() {
    let dir = create_test_dir();
    let rules = write_json(dir.path(), "rules.json", &pricing_rules());

    let output = run(&[
        "-j",
        "eval",
        rules.to_str().unwrap(),
        "--url",
        "/pricing",
        "--device",
        "tablet",
        "--trace",
    ]);

    let json = json_output(&output);
    let groups = json["result"]["trace"].as_array().unwrap();
    assert_eq!(json["result"]["visible"], false);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["logic"], "AND");
    assert_eq!(groups[0]["passed"], false);

    let details = groups[0]["details"].as_array().unwrap();
    assert_eq!(details[0]["condition"], "URL contains \"pricing\"");
    assert_eq!(details[0]["result"], true);
    assert_eq!(details[1]["type"], "device");
    assert_eq!(details[1]["result"], false);
}

#[test]
fn test_eval_trace_text() {
    let dir = create_test_dir();
    let rules = write_json(dir.path(), "rules.json", &pricing_rules());

    let output = run(&[
        "--no-json",
        "eval",
        rules.to_str().unwrap(),
        "--url",
        "/pricing",
        "--device",
        "mobile",
        "--trace",
    ]);

    let text = stdout(&output);
    assert!(text.contains("group 0 [AND]: passed"), "{}", text);
    assert!(text.contains("Device is mobile"));
    assert!(text.trim_end().ends_with("visible"));
}

#[test]
fn test_eval_legacy_rules_from_stdin() {
    let rules = json!({ "logic": "OR", "rules": [
        { "type": "browser", "operator": "is", "value": "firefox", "enabled": true },
        { "type": "language", "operator": "is", "value": "de", "enabled": true }
    ]});

    let output = run_with_stdin(
        &["-j", "eval", "-", "--language", "de-CH", "--browser", "chrome"],
        &rules.to_string(),
    );

    assert!(output.status.success(), "stderr={}", stderr(&output));
    assert_eq!(json_output(&output)["result"]["visible"], true);
}

#[test]
fn test_eval_context_file_with_flag_override() {
    let dir = create_test_dir();
    let rules = write_json(
        dir.path(),
        "rules.json",
        &json!([{ "logic": "AND", "conditions": [
            { "type": "user_status", "operator": "is_logged_in", "value": "" },
            { "type": "page_url", "operator": "is", "value": "/account" }
        ]}]),
    );
    let context = write_json(
        dir.path(),
        "context.json",
        &json!({ "url": "/account", "isLoggedIn": false }),
    );

    let rules = rules.to_str().unwrap();
    let context = context.to_str().unwrap();

    let output = run(&["-j", "eval", rules, "--context", context]);
    assert_eq!(json_output(&output)["result"]["visible"], false);

    let output = run(&["-j", "eval", rules, "--context", context, "--logged-in"]);
    assert_eq!(json_output(&output)["result"]["visible"], true);
}

#[test]
fn test_eval_time_window() {
    let dir = create_test_dir();
    let rules = write_json(
        dir.path(),
        "rules.json",
        &json!({ "logic": "AND", "rules": [
            { "type": "date_time", "operator": "between_times", "value": "09:00-17:00", "enabled": true }
        ]}),
    );
    let rules = rules.to_str().unwrap();

    let output = run(&["-j", "eval", rules, "--time", "16:59"]);
    assert_eq!(json_output(&output)["result"]["visible"], true);

    let output = run(&["-j", "eval", rules, "--time", "17:01"]);
    assert_eq!(json_output(&output)["result"]["visible"], false);
}

#[test]
fn test_eval_loose_time_window_hidden() {
    let rules = json!([{ "logic": "OR", "conditions": [
        { "type": "date_time", "operator": "between_times", "value": "9AM-5PM" },
        { "type": "date_time", "operator": "between_times", "value": "9-17" }
    ]}]);

    let output = run_with_stdin(
        &["-j", "eval", "-", "--time", "12:00", "--trace"],
        &rules.to_string(),
    );
    let json = json_output(&output);
    assert_eq!(json["result"]["visible"], false);
    let details = json["result"]["trace"][0]["details"].as_array().unwrap();
    assert_eq!(details[0]["reason"], "Malformed value '9AM-5PM' for between_times");
    assert_eq!(details[1]["reason"], "Malformed value '9-17' for between_times");
}

#[test]
fn test_eval_empty_rules_visible() {
    let output = run_with_stdin(&["-j", "eval", "-"], "");
    assert!(output.status.success());
    assert_eq!(json_output(&output)["result"]["visible"], true);
}

#[test]
fn test_eval_invalid_rules() {
    let output = run_with_stdin(&["-j", "eval", "-"], "{ not json");

    assert_eq!(output.status.code(), Some(6));
    let json = json_output(&output);
    assert_eq!(json["error"]["code"], -32006);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("invalid rules"));
}

#[test]
fn test_eval_missing_rule_file() {
    let output = run(&["--no-json", "eval", "/nonexistent/rules.json"]);
    assert_eq!(output.status.code(), Some(6));
    assert!(stderr(&output).contains("failed to read"));
}

#[test]
fn test_eval_invalid_context_value() {
    let output = run_with_stdin(&["-j", "eval", "-", "--device", "watch"], "null");
    assert_eq!(output.status.code(), Some(4));
    assert!(json_output(&output)["error"]["message"]
        .as_str()
        .unwrap()
        .contains("invalid device 'watch'"));
}

#[test]
fn test_eval_debug_logs_to_stderr() {
    let output = run_with_stdin(
        &["-j", "--debug", "eval", "-", "--device", "mobile"],
        r#"[{"logic":"AND","conditions":[{"type":"device","operator":"is","value":"mobile"}]}]"#,
    );

    assert!(output.status.success());
    assert_eq!(json_output(&output)["result"]["visible"], true);
    assert!(
        stderr(&output).contains("condition evaluated"),
        "stderr={}",
        stderr(&output)
    );
}

#[test]
fn test_eval_scripts_disabled_in_config() {
    let dir = create_test_dir();
    let config = write_json(
        dir.path(),
        "config.json",
        &json!({ "scripts": { "enabled": false } }),
    );
    let rules = write_json(
        dir.path(),
        "rules.json",
        &json!([{ "logic": "AND", "conditions": [
            { "type": "custom_js", "operator": "returns_true", "value": "true" }
        ]}]),
    );
    let rules = rules.to_str().unwrap();

    let output = run(&["-j", "eval", rules]);
    assert_eq!(json_output(&output)["result"]["visible"], true);

    let output = run_with_config(&["-j", "eval", rules], &config);
    assert_eq!(json_output(&output)["result"]["visible"], false);
}
