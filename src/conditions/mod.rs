//! condition evaluation for smart sections
//!
//! a section carries a rule tree: groups of typed conditions combined with
//! AND/OR inside a group and AND across groups. provides:
//! - parsing of stored rule JSON (current and legacy shapes)
//! - evaluation against a visitor context, with optional traces
//! - static checks for broken rules
//!
//! an empty or missing tree always shows the section.

mod eval;
pub mod expr;
mod lint;
mod parser;
pub mod time;
mod types;

pub use eval::{ConditionOutcome, Evaluator, GroupOutcome, ScriptPolicy, SectionTrace};
pub use expr::{ExprError, ExprLimits};
pub use lint::{check_condition, check_rules, Issue};
pub use parser::{parse_condition, parse_rules, parse_rules_str, RuleError};
pub use types::{Condition, ConditionGroup, ConditionKind, Logic, Operator, RuleTree, KNOWN_TYPES};
