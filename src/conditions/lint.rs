//! static checks for rule trees
//!
//! the evaluator silently treats broken conditions as false; this module
//! reports them up front so authors can fix their rules.

use std::fmt;

use serde::Serialize;
use strsim::levenshtein;

use super::expr::{self, ExprLimits};
use super::time::parse_time_range;
use super::types::{Condition, ConditionKind, Operator, RuleTree, KNOWN_TYPES};

/// a problem found in one condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub group: usize,
    pub condition: usize,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "groups[{}].conditions[{}]: {}",
            self.group, self.condition, self.message
        )
    }
}

/// check every condition of a tree, disabled ones included
pub fn check_rules(tree: &RuleTree, limits: &ExprLimits) -> Vec<Issue> {
    let mut issues = Vec::new();
    for (g, group) in tree.groups.iter().enumerate() {
        for (c, condition) in group.conditions.iter().enumerate() {
            if let Some(message) = check_condition(condition, limits) {
                issues.push(Issue {
                    group: g,
                    condition: c,
                    message,
                });
            }
        }
    }
    issues
}

/// describe what is wrong with a condition, if anything
pub fn check_condition(condition: &Condition, limits: &ExprLimits) -> Option<String> {
    if let ConditionKind::Unknown(name) = &condition.kind {
        if name.is_empty() {
            return Some("missing condition type".to_string());
        }
        return Some(match suggest(name, KNOWN_TYPES) {
            Some(s) => format!("unknown condition type \"{}\", did you mean \"{}\"?", name, s),
            None => format!("unknown condition type \"{}\"", name),
        });
    }

    if !condition.kind.supports(&condition.operator) {
        let allowed = condition.kind.operator_names();
        let op = condition.operator.name();
        let mut message = format!(
            "operator \"{}\" is not valid for {} (expected one of: {})",
            op,
            condition.kind,
            allowed.join(", ")
        );
        if let Some(s) = suggest(op, allowed) {
            message.push_str(&format!(", did you mean \"{}\"?", s));
        }
        return Some(message);
    }

    match (&condition.kind, &condition.operator) {
        (ConditionKind::DateTime, Operator::BetweenTimes) => parse_time_range(&condition.value)
            .is_none()
            .then(|| format!("malformed time range \"{}\" (use HH:MM-HH:MM)", condition.value)),
        (ConditionKind::Expression, _) => expr::compile(&condition.value, limits)
            .err()
            .map(|e| format!("invalid expression: {}", e)),
        _ => None,
    }
}

/// closest candidate within a small edit distance
fn suggest<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let input = input.to_lowercase();
    let threshold = (input.chars().count() / 3).max(2);

    candidates
        .iter()
        .map(|c| (*c, levenshtein(&input, c)))
        .filter(|(_, distance)| *distance <= threshold)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(c, _)| c)
}
