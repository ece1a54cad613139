// integration tests for the check command

use serde_json::json;

use crate::common::*;

#[test]
fn test_check_valid_rules() {
    let dir = create_test_dir();
    let rules = write_json(
        dir.path(),
        "rules.json",
        &json!({ "groups": [
            { "logic": "AND", "conditions": [
                { "type": "page_url", "operator": "starts_with", "value": "/shop" },
                { "type": "date_time", "operator": "between_times", "value": "09:00-17:00" }
            ]},
            { "logic": "OR", "conditions": [
                { "type": "custom_js", "operator": "returns_true", "value": "!is_logged_in" }
            ]}
        ]}),
    );

    let output = run(&["-j", "check", rules.to_str().unwrap()]);

    assert!(output.status.success(), "stderr={}", stderr(&output));
    let json = json_output(&output);
    assert_eq!(json["result"]["valid"], true);
    assert_eq!(json["result"]["groups"], 2);
    assert_eq!(json["result"]["conditions"], 3);
}

#[test]
fn test_check_reports_problems() {
    let rules = json!({ "logic": "AND", "rules": [
        { "type": "devise", "operator": "is", "value": "mobile", "enabled": true },
        { "type": "device", "operator": "contains", "value": "mob", "enabled": true },
        { "type": "date_time", "operator": "between_times", "value": "later", "enabled": true },
        { "type": "custom_js", "operator": "returns_true", "value": "document.cookie", "enabled": true },
        { "type": "browser", "operator": "is", "value": "chrome", "enabled": true }
    ]});

    let output = run_with_stdin(&["-j", "check", "-"], &rules.to_string());

    assert_eq!(output.status.code(), Some(6));
    let json = json_output(&output);
    assert_eq!(json["error"]["code"], -32006);
    assert_eq!(json["error"]["message"], "4 problem(s) found in -");

    let details: Vec<&str> = json["error"]["data"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d.as_str().unwrap())
        .collect();
    assert_eq!(details.len(), 4);
    assert_eq!(
        details[0],
        "groups[0].conditions[0]: unknown condition type \"devise\", did you mean \"device\"?"
    );
    assert!(details[1].starts_with("groups[0].conditions[1]: operator \"contains\""));
    assert!(details[2].contains("malformed time range \"later\""));
    assert!(details[3].contains("invalid expression"));
}

#[test]
fn test_check_text_output() {
    let output = run_with_stdin(
        &["--no-json", "check", "-"],
        r#"[{"logic":"AND","conditions":[{"type":"refferer","operator":"contains","value":"x"}]}]"#,
    );

    assert_eq!(output.status.code(), Some(6));
    let err = stderr(&output);
    assert!(err.contains("Error: 1 problem(s) found"), "{}", err);
    assert!(err.contains("did you mean \"referrer\"?"), "{}", err);
}

#[test]
fn test_check_respects_expression_limits_from_config() {
    let dir = create_test_dir();
    let config = write_json(
        dir.path(),
        "config.json",
        &json!({ "scripts": { "max_len": 8 } }),
    );
    let rules = write_json(
        dir.path(),
        "rules.json",
        &json!([{ "logic": "AND", "conditions": [
            { "type": "custom_js", "operator": "returns_true", "value": "device == 'mobile'" }
        ]}]),
    );

    let output = run_with_config(&["-j", "check", rules.to_str().unwrap()], &config);
    assert_eq!(output.status.code(), Some(6));
    assert!(stdout(&output).contains("characters long (limit 8)"));
}

#[test]
fn test_check_rejects_non_rule_document() {
    let output = run_with_stdin(&["-j", "check", "-"], "42");
    assert_eq!(output.status.code(), Some(6));
    assert!(json_output(&output)["error"]["message"]
        .as_str()
        .unwrap()
        .contains("expected an object or array"));
}
