// library-level scenarios: stored rule JSON evaluated against built contexts

use chrono::NaiveDate;
use serde_json::json;

use smart_sections::conditions::{parse_rules, Evaluator, ScriptPolicy};
use smart_sections::context::{Browser, Context, Device};

fn friday_noon() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn pricing_on_mobile() -> Context {
    Context::builder()
        .with_url("/pricing")
        .with_device("mobile")
        .with_browser("chrome")
        .with_logged_in(false)
        .build_at(friday_noon())
        .unwrap()
}

fn two_conditions(device: &str) -> serde_json::Value {
    json!({
        "groups": [{
            "logic": "AND",
            "enabled": true,
            "conditions": [
                { "type": "page_url", "operator": "contains", "value": "pricing", "enabled": true },
                { "type": "device", "operator": "is", "value": device, "enabled": true }
            ]
        }]
    })
}

#[test]
fn test_pricing_page_on_mobile() {
    let evaluator = Evaluator::default();
    let ctx = pricing_on_mobile();

    assert!(evaluator.evaluate_section_json(&two_conditions("mobile"), &ctx));
    assert!(!evaluator.evaluate_section_json(&two_conditions("desktop"), &ctx));
}

#[test]
fn test_legacy_and_current_shapes_agree() {
    let evaluator = Evaluator::default();
    let ctx = pricing_on_mobile();

    for device in ["mobile", "desktop", "MOBILE"] {
        let current = two_conditions(device);
        let legacy = json!({
            "logic": "AND",
            "rules": current["groups"][0]["conditions"].clone()
        });
        assert_eq!(
            evaluator.evaluate_section_json(&current, &ctx),
            evaluator.evaluate_section_json(&legacy, &ctx),
            "device {}",
            device
        );
    }
}

#[test]
fn test_disabling_all_conditions_equals_disabling_group() {
    let evaluator = Evaluator::default();
    let ctx = pricing_on_mobile();

    let conditions_off = json!({ "groups": [{
        "logic": "AND",
        "conditions": [
            { "type": "device", "operator": "is", "value": "desktop", "enabled": false }
        ]
    }]});
    let group_off = json!({ "groups": [{
        "logic": "AND",
        "enabled": false,
        "conditions": [
            { "type": "device", "operator": "is", "value": "desktop", "enabled": true }
        ]
    }]});

    assert!(evaluator.evaluate_section_json(&conditions_off, &ctx));
    assert!(evaluator.evaluate_section_json(&group_off, &ctx));
}

#[test]
fn test_groups_are_anded_across_shapes() {
    let evaluator = Evaluator::default();
    let ctx = pricing_on_mobile();

    // first group passes via OR, second group fails
    let rules = json!([
        { "logic": "OR", "conditions": [
            { "type": "browser", "operator": "is", "value": "firefox" },
            { "type": "browser", "operator": "is", "value": "chrome" }
        ]},
        { "logic": "AND", "conditions": [
            { "type": "user_status", "operator": "is_logged_in", "value": "" }
        ]}
    ]);
    assert!(!evaluator.evaluate_section_json(&rules, &ctx));

    let tree = parse_rules(&rules).unwrap();
    let trace = evaluator.trace_section(Some(&tree), &ctx);
    assert!(trace.groups[0].passed);
    assert!(!trace.groups[1].passed);
}

#[test]
fn test_time_window() {
    let evaluator = Evaluator::default();
    let rules = json!({ "groups": [{ "logic": "AND", "conditions": [
        { "type": "date_time", "operator": "between_times", "value": "09:00-17:00" }
    ]}]});

    let at = |time: &str| {
        Context::builder()
            .with_time(time)
            .build_at(friday_noon())
            .unwrap()
    };

    assert!(evaluator.evaluate_section_json(&rules, &at("09:00")));
    assert!(evaluator.evaluate_section_json(&rules, &at("17:00")));
    assert!(!evaluator.evaluate_section_json(&rules, &at("08:59")));
    assert!(!evaluator.evaluate_section_json(&rules, &at("17:01")));
}

#[test]
fn test_day_and_date_operators_are_not_supported() {
    let evaluator = Evaluator::default();
    let ctx = pricing_on_mobile();
    for (operator, value) in [
        ("specific_days", "mon,tue,wed,thu,fri,sat,sun"),
        ("between_dates", "2000-01-01/2099-12-31"),
    ] {
        let rules = json!({ "logic": "AND", "rules": [
            { "type": "date_time", "operator": operator, "value": value, "enabled": true }
        ]});
        assert!(!evaluator.evaluate_section_json(&rules, &ctx), "{}", operator);
    }
}

#[test]
fn test_broken_conditions_only_affect_themselves() {
    let evaluator = Evaluator::new(true);
    let ctx = pricing_on_mobile();

    let rules = json!({ "groups": [{ "logic": "OR", "conditions": [
        { "type": "geo_ip", "operator": "is", "value": "DE" },
        { "type": "custom_js", "operator": "returns_true", "value": "fetch('/x')" },
        { "type": "date_time", "operator": "between_times", "value": "whenever" },
        { "type": "custom_js", "operator": "returns_true", "value": "url.includes('pric')" }
    ]}]});
    assert!(evaluator.evaluate_section_json(&rules, &ctx));

    let tree = parse_rules(&rules).unwrap();
    let results: Vec<bool> = evaluator.trace_section(Some(&tree), &ctx).groups[0]
        .details
        .iter()
        .map(|d| d.result)
        .collect();
    assert_eq!(results, vec![false, false, false, true]);
}

#[test]
fn test_expressions_disabled_by_policy() {
    let evaluator = Evaluator::default().with_script_policy(ScriptPolicy {
        enabled: false,
        ..ScriptPolicy::default()
    });
    let rules = json!({ "logic": "AND", "rules": [
        { "type": "custom_js", "operator": "returns_true", "value": "true", "enabled": true }
    ]});
    assert!(!evaluator.evaluate_section_json(&rules, &pricing_on_mobile()));
}

#[test]
fn test_context_from_user_agent_and_href() {
    let ctx = Context::builder()
        .with_user_agent(
            "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 \
             (KHTML, like Gecko) Version/16.6 Safari/604.1",
        )
        .with_href("https://example.com/blog/post?elementor-preview=12")
        .with_language("de-AT")
        .build_at(friday_noon())
        .unwrap();

    assert_eq!(ctx.device, Device::Tablet);
    assert_eq!(ctx.browser, Browser::Safari);
    assert_eq!(ctx.url, "/blog/post");
    assert_eq!(ctx.language, "de");
    assert!(ctx.is_editor_mode);

    let evaluator = Evaluator::default();
    let rules = json!({ "groups": [{ "logic": "AND", "conditions": [
        { "type": "elementor_mode", "operator": "is_active", "value": "" },
        { "type": "language", "operator": "is", "value": "DE" },
        { "type": "page_url", "operator": "starts_with", "value": "/blog" }
    ]}]});
    assert!(evaluator.evaluate_section_json(&rules, &ctx));
}

#[test]
fn test_empty_rules_always_visible() {
    let evaluator = Evaluator::default();
    let ctx = pricing_on_mobile();
    for rules in [json!(null), json!([]), json!({}), json!({ "groups": [] })] {
        assert!(evaluator.evaluate_section_json(&rules, &ctx), "{}", rules);
    }
    assert!(evaluator.evaluate_section(None, &ctx));
}
