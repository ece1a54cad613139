//! rule parser - converts stored rule JSON to a [`RuleTree`]
//!
//! accepted shapes:
//! - `{ "groups": [ { "logic", "conditions": [...], "enabled" } ], "version": "2.0" }`
//! - legacy single group: `{ "logic": "AND", "rules": [...] }`
//! - a bare array of groups
//! - `null`, `[]`, `{}`: no conditions (always visible)
//!
//! individual conditions never fail to parse: unknown types and operators
//! are kept as-is and evaluate to false. only a document whose structure is
//! not a rule tree at all is rejected.

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use super::types::{Condition, ConditionGroup, ConditionKind, Logic, Operator, RuleTree};

/// error type for parsing rule documents
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{path}: {message}")]
    Shape { path: String, message: String },
}

impl RuleError {
    fn shape(path: impl Into<String>, message: impl Into<String>) -> Self {
        RuleError::Shape {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// parse rule JSON text
pub fn parse_rules_str(text: &str) -> Result<RuleTree, RuleError> {
    if text.trim().is_empty() {
        return Ok(RuleTree::default());
    }
    let json: JsonValue = serde_json::from_str(text)?;
    parse_rules(&json)
}

/// parse a rule document into a normalized tree
pub fn parse_rules(json: &JsonValue) -> Result<RuleTree, RuleError> {
    match json {
        JsonValue::Null => Ok(RuleTree::default()),
        JsonValue::Array(groups) => parse_groups(groups, "").map(RuleTree::new),
        JsonValue::Object(obj) => parse_document(obj),
        other => Err(RuleError::shape(
            "$",
            format!("expected an object or array, got {}", json_type(other)),
        )),
    }
}

fn parse_document(obj: &Map<String, JsonValue>) -> Result<RuleTree, RuleError> {
    // legacy single-group shape
    if let (Some(logic), Some(rules)) = (obj.get("logic"), obj.get("rules")) {
        let rules = match rules {
            JsonValue::Array(rules) => rules,
            JsonValue::Null => return Ok(RuleTree::default()),
            other => {
                return Err(RuleError::shape(
                    "rules",
                    format!("expected an array, got {}", json_type(other)),
                ))
            }
        };
        let group = ConditionGroup {
            logic: Logic::parse(logic.as_str()),
            conditions: rules.iter().map(parse_condition).collect(),
            enabled: true,
        };
        return Ok(RuleTree::new(vec![group]));
    }

    match obj.get("groups") {
        Some(JsonValue::Array(groups)) => parse_groups(groups, "groups").map(RuleTree::new),
        Some(JsonValue::Null) | None => Ok(RuleTree::default()),
        Some(other) => Err(RuleError::shape(
            "groups",
            format!("expected an array, got {}", json_type(other)),
        )),
    }
}

fn parse_groups(groups: &[JsonValue], path: &str) -> Result<Vec<ConditionGroup>, RuleError> {
    groups
        .iter()
        .enumerate()
        .map(|(i, g)| parse_group(g, &format!("{}[{}]", path, i)))
        .collect()
}

fn parse_group(json: &JsonValue, path: &str) -> Result<ConditionGroup, RuleError> {
    let obj = json.as_object().ok_or_else(|| {
        RuleError::shape(
            path,
            format!("expected a group object, got {}", json_type(json)),
        )
    })?;

    let conditions = match obj.get("conditions") {
        Some(JsonValue::Array(items)) => items.iter().map(parse_condition).collect(),
        Some(JsonValue::Null) | None => Vec::new(),
        Some(other) => {
            return Err(RuleError::shape(
                format!("{}.conditions", path),
                format!("expected an array, got {}", json_type(other)),
            ))
        }
    };

    Ok(ConditionGroup {
        logic: Logic::parse(obj.get("logic").and_then(JsonValue::as_str)),
        conditions,
        enabled: parse_enabled(obj),
    })
}

/// parse one stored condition; never fails
pub fn parse_condition(json: &JsonValue) -> Condition {
    let Some(obj) = json.as_object() else {
        return Condition::new(
            ConditionKind::Unknown(format!("<{}>", json_type(json))),
            Operator::Other(String::new()),
            json.to_string(),
        );
    };

    let kind = obj
        .get("type")
        .and_then(JsonValue::as_str)
        .map(ConditionKind::parse)
        .unwrap_or_else(|| ConditionKind::Unknown(String::new()));

    let operator = Operator::parse(
        obj.get("operator")
            .and_then(JsonValue::as_str)
            .unwrap_or_default(),
    );

    Condition {
        kind,
        operator,
        value: value_to_string(obj.get("value")),
        enabled: parse_enabled(obj),
    }
}

/// missing or non-boolean `enabled` counts as enabled
///
/// intentionally differs from the stored-rule runtime, which reads a missing
/// flag as disabled
fn parse_enabled(obj: &Map<String, JsonValue>) -> bool {
    obj.get("enabled")
        .and_then(JsonValue::as_bool)
        .unwrap_or(true)
}

/// stored values are strings; lists are joined with commas
fn value_to_string(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Bool(b)) => b.to_string(),
        Some(JsonValue::Number(n)) => n.to_string(),
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|v| value_to_string(Some(v)))
            .collect::<Vec<_>>()
            .join(","),
        Some(other @ JsonValue::Object(_)) => other.to_string(),
    }
}

fn json_type(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
