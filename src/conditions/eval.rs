//! condition evaluator
//!
//! evaluates rule trees against a visitor [`Context`]. evaluation never
//! fails: a condition that cannot be evaluated (unknown type, unsupported
//! operator, malformed value, bad expression) is false, and only that
//! condition is affected.

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};

use super::expr::{self, ExprError, ExprLimits};
use super::parser::parse_rules;
use super::time::{parse_clock, parse_time_range};
use super::types::{Condition, ConditionGroup, ConditionKind, Logic, Operator, RuleTree};
use crate::context::Context;

/// how `custom_js` conditions are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptPolicy {
    /// when false every `custom_js` condition is false
    pub enabled: bool,
    pub limits: ExprLimits,
}

impl Default for ScriptPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            limits: ExprLimits::default(),
        }
    }
}

/// why a condition evaluated to false without being checked
#[derive(Debug, Error)]
enum Fault {
    #[error("Unknown condition type: {0}")]
    UnknownType(String),
    #[error("Unsupported operator '{op}' for {kind}")]
    UnsupportedOperator { kind: String, op: String },
    #[error("Malformed value '{value}' for {op}")]
    MalformedValue { op: String, value: String },
    #[error("Context {field} '{value}' is malformed")]
    MalformedContext { field: &'static str, value: String },
    #[error("Expressions are disabled")]
    ScriptsDisabled,
    #[error("Expression error: {0}")]
    Expr(#[from] ExprError),
}

/// outcome of a single condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionOutcome {
    /// human-readable description, e.g. "Device is desktop"
    pub condition: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub operator: String,
    pub value: String,
    pub enabled: bool,
    pub result: bool,
    pub reason: String,
}

/// outcome of a group and its conditions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupOutcome {
    pub logic: Logic,
    pub enabled: bool,
    pub passed: bool,
    pub details: Vec<ConditionOutcome>,
}

/// full diagnostic trace of a section; never changes the decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionTrace {
    pub visible: bool,
    pub groups: Vec<GroupOutcome>,
}

/// evaluates rule trees; holds no state besides its flags
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    debug: bool,
    scripts: ScriptPolicy,
}

impl Evaluator {
    /// create an evaluator; `debug` enables per-condition logging
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            scripts: ScriptPolicy::default(),
        }
    }

    /// set the `custom_js` policy
    pub fn with_script_policy(mut self, scripts: ScriptPolicy) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn set_debug_mode(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn script_policy(&self) -> &ScriptPolicy {
        &self.scripts
    }

    /// decide whether a section is visible
    ///
    /// a missing or empty tree is visible. groups are ANDed; disabled groups
    /// are skipped and the first failing group hides the section.
    pub fn evaluate_section(&self, tree: Option<&RuleTree>, ctx: &Context) -> bool {
        let Some(tree) = tree.filter(|t| !t.is_empty()) else {
            if self.debug {
                debug!("no conditions, section visible");
            }
            return true;
        };

        for (i, group) in tree.groups.iter().enumerate() {
            if !group.enabled {
                if self.debug {
                    debug!(group = i, "group disabled, skipped");
                }
                continue;
            }

            if !self.evaluate_group(group, ctx).passed {
                if self.debug {
                    debug!(group = i, "section hidden: group failed");
                }
                return false;
            }
        }

        if self.debug {
            debug!("section visible: all groups passed");
        }
        true
    }

    /// decide visibility straight from stored rule JSON
    ///
    /// a document that is not a rule tree hides the section
    pub fn evaluate_section_json(&self, json: &JsonValue, ctx: &Context) -> bool {
        match parse_rules(json) {
            Ok(tree) => self.evaluate_section(Some(&tree), ctx),
            Err(e) => {
                if self.debug {
                    warn!(error = %e, "rules could not be parsed, section hidden");
                }
                false
            }
        }
    }

    /// evaluate every group and condition for display; `visible` matches
    /// [`Evaluator::evaluate_section`]
    pub fn trace_section(&self, tree: Option<&RuleTree>, ctx: &Context) -> SectionTrace {
        let groups: Vec<GroupOutcome> = tree
            .map(|t| t.groups.iter().map(|g| self.evaluate_group(g, ctx)).collect())
            .unwrap_or_default();
        let visible = groups.iter().all(|g| g.passed);
        SectionTrace { visible, groups }
    }

    /// evaluate one group
    ///
    /// disabled groups pass. disabled conditions are reported but do not
    /// count; a group with nothing left to evaluate passes for AND and OR alike.
    pub fn evaluate_group(&self, group: &ConditionGroup, ctx: &Context) -> GroupOutcome {
        if !group.enabled {
            return GroupOutcome {
                logic: group.logic,
                enabled: false,
                passed: true,
                details: Vec::new(),
            };
        }

        let details: Vec<ConditionOutcome> = group
            .conditions
            .iter()
            .map(|c| self.evaluate_condition(c, ctx))
            .collect();

        let mut results = details.iter().filter(|d| d.enabled).map(|d| d.result).peekable();
        let passed = match group.logic {
            Logic::And => results.all(|r| r),
            Logic::Or => results.peek().is_none() || results.any(|r| r),
        };

        if self.debug {
            debug!(
                logic = %group.logic,
                passed,
                evaluated = details.iter().filter(|d| d.enabled).count(),
                "group evaluated"
            );
        }

        GroupOutcome {
            logic: group.logic,
            enabled: true,
            passed,
            details,
        }
    }

    /// evaluate one condition; a disabled condition is true
    pub fn evaluate_condition(&self, condition: &Condition, ctx: &Context) -> ConditionOutcome {
        let (result, reason) = if !condition.enabled {
            (true, "Condition disabled".to_string())
        } else {
            match self.check(condition, ctx) {
                Ok(result) => (result, format!("{}: {}", condition, result)),
                Err(fault) => {
                    if self.debug {
                        warn!(
                            condition_type = condition.kind.name(),
                            operator = condition.operator.name(),
                            value = %condition.value,
                            "{}",
                            fault
                        );
                    }
                    (false, fault.to_string())
                }
            }
        };

        if self.debug {
            debug!(
                condition_type = condition.kind.name(),
                operator = condition.operator.name(),
                value = %condition.value,
                result,
                reason = %reason,
                "condition evaluated"
            );
        }

        ConditionOutcome {
            condition: condition.to_string(),
            kind: condition.kind.name().to_string(),
            operator: condition.operator.name().to_string(),
            value: condition.value.clone(),
            enabled: condition.enabled,
            result,
            reason,
        }
    }

    fn check(&self, c: &Condition, ctx: &Context) -> Result<bool, Fault> {
        if let ConditionKind::Unknown(name) = &c.kind {
            return Err(Fault::UnknownType(name.clone()));
        }
        if !c.kind.supports(&c.operator) {
            return Err(Fault::UnsupportedOperator {
                kind: c.kind.name().to_string(),
                op: c.operator.name().to_string(),
            });
        }

        match &c.kind {
            ConditionKind::PageUrl | ConditionKind::Referrer => {
                let actual = if c.kind == ConditionKind::PageUrl {
                    &ctx.url
                } else {
                    &ctx.referrer
                };
                Ok(match_text(&c.operator, actual, &c.value))
            }
            ConditionKind::Device => Ok(match_equality(&c.operator, ctx.device.as_str(), &c.value)),
            ConditionKind::Browser => {
                Ok(match_equality(&c.operator, ctx.browser.as_str(), &c.value))
            }
            ConditionKind::Language => Ok(match_equality(&c.operator, &ctx.language, &c.value)),
            ConditionKind::DateTime => evaluate_date_time(c, ctx),
            ConditionKind::UserStatus => Ok(match c.operator {
                Operator::IsLoggedIn => ctx.is_logged_in,
                Operator::IsNotLoggedIn => !ctx.is_logged_in,
                _ => false,
            }),
            ConditionKind::EditorMode => Ok(ctx.is_editor_mode),
            ConditionKind::Expression => {
                if !self.scripts.enabled {
                    return Err(Fault::ScriptsDisabled);
                }
                let compiled = expr::compile(&c.value, &self.scripts.limits)?;
                Ok(compiled.matches(ctx))
            }
            ConditionKind::Unknown(name) => Err(Fault::UnknownType(name.clone())),
        }
    }
}

// ============================================================================
// Condition Handlers
// ============================================================================

fn match_text(op: &Operator, actual: &str, expected: &str) -> bool {
    match op {
        Operator::Is => actual == expected,
        Operator::Contains => actual.contains(expected),
        Operator::StartsWith => actual.starts_with(expected),
        Operator::EndsWith => actual.ends_with(expected),
        _ => false,
    }
}

fn match_equality(op: &Operator, actual: &str, expected: &str) -> bool {
    let same = actual.to_lowercase() == expected.to_lowercase();
    match op {
        Operator::Is => same,
        Operator::IsNot => !same,
        _ => false,
    }
}

fn evaluate_date_time(c: &Condition, ctx: &Context) -> Result<bool, Fault> {
    let malformed = || Fault::MalformedValue {
        op: c.operator.name().to_string(),
        value: c.value.clone(),
    };

    match c.operator {
        Operator::BetweenTimes => {
            let range = parse_time_range(&c.value).ok_or_else(malformed)?;
            let now = parse_clock(&ctx.current_time).ok_or_else(|| Fault::MalformedContext {
                field: "time",
                value: ctx.current_time.clone(),
            })?;
            Ok(range.contains(now))
        }
        _ => Ok(false),
    }
}
