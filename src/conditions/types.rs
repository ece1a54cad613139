//! core types for the condition system

use std::fmt;

use serde::Serialize;

/// how the conditions of a group are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    /// every enabled condition must pass
    And,
    /// at least one enabled condition must pass
    Or,
}

impl Logic {
    /// parse the stored logic string
    ///
    /// only "AND" (any case) selects conjunction; every other value,
    /// including a missing one, is treated as OR like stored rules always were
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some(s) if s.trim().eq_ignore_ascii_case("and") => Logic::And,
            _ => Logic::Or,
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logic::And => write!(f, "AND"),
            Logic::Or => write!(f, "OR"),
        }
    }
}

/// the aspect of the visitor context a condition inspects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionKind {
    /// `page_url`
    PageUrl,
    /// `device`
    Device,
    /// `browser`
    Browser,
    /// `language`
    Language,
    /// `referrer`
    Referrer,
    /// `date_time`
    DateTime,
    /// `user_status`
    UserStatus,
    /// `elementor_mode`
    EditorMode,
    /// `custom_js`, evaluated as a sandboxed expression
    Expression,
    /// any type name this build does not know
    Unknown(String),
}

/// every condition type name understood by the evaluator
pub const KNOWN_TYPES: &[&str] = &[
    "page_url",
    "device",
    "browser",
    "language",
    "referrer",
    "date_time",
    "user_status",
    "elementor_mode",
    "custom_js",
];

impl ConditionKind {
    /// parse a stored type name
    pub fn parse(s: &str) -> Self {
        match s {
            "page_url" => ConditionKind::PageUrl,
            "device" => ConditionKind::Device,
            "browser" => ConditionKind::Browser,
            "language" => ConditionKind::Language,
            "referrer" => ConditionKind::Referrer,
            "date_time" => ConditionKind::DateTime,
            "user_status" => ConditionKind::UserStatus,
            "elementor_mode" => ConditionKind::EditorMode,
            "custom_js" => ConditionKind::Expression,
            other => ConditionKind::Unknown(other.to_string()),
        }
    }

    /// the stored type name
    pub fn name(&self) -> &str {
        match self {
            ConditionKind::PageUrl => "page_url",
            ConditionKind::Device => "device",
            ConditionKind::Browser => "browser",
            ConditionKind::Language => "language",
            ConditionKind::Referrer => "referrer",
            ConditionKind::DateTime => "date_time",
            ConditionKind::UserStatus => "user_status",
            ConditionKind::EditorMode => "elementor_mode",
            ConditionKind::Expression => "custom_js",
            ConditionKind::Unknown(name) => name,
        }
    }

    /// label used in condition descriptions
    fn label(&self) -> &str {
        match self {
            ConditionKind::PageUrl => "URL",
            ConditionKind::Device => "Device",
            ConditionKind::Browser => "Browser",
            ConditionKind::Language => "Language",
            ConditionKind::Referrer => "Referrer",
            ConditionKind::DateTime => "Time",
            ConditionKind::UserStatus => "User",
            ConditionKind::EditorMode => "Editor mode",
            ConditionKind::Expression => "Expression",
            ConditionKind::Unknown(name) => name,
        }
    }

    /// operator names accepted for this kind
    ///
    /// empty for kinds that ignore their operator
    pub fn operator_names(&self) -> &'static [&'static str] {
        match self {
            ConditionKind::PageUrl => &["is", "contains", "starts_with", "ends_with"],
            ConditionKind::Device | ConditionKind::Browser | ConditionKind::Language => {
                &["is", "is_not"]
            }
            ConditionKind::Referrer => &["contains", "is", "starts_with"],
            ConditionKind::DateTime => &["between_times"],
            ConditionKind::UserStatus => &["is_logged_in", "is_not_logged_in"],
            ConditionKind::EditorMode | ConditionKind::Expression => &[],
            ConditionKind::Unknown(_) => &[],
        }
    }

    /// check whether an operator is meaningful for this kind
    pub fn supports(&self, op: &Operator) -> bool {
        match self {
            ConditionKind::EditorMode | ConditionKind::Expression => true,
            ConditionKind::Unknown(_) => false,
            _ => self.operator_names().contains(&op.name()),
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// condition operators, shared across kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Is,
    IsNot,
    Contains,
    StartsWith,
    EndsWith,
    BetweenTimes,
    IsLoggedIn,
    IsNotLoggedIn,
    /// anything else, kept verbatim for diagnostics
    Other(String),
}

impl Operator {
    /// parse a stored operator name
    pub fn parse(s: &str) -> Self {
        match s {
            "is" => Operator::Is,
            "is_not" => Operator::IsNot,
            "contains" => Operator::Contains,
            "starts_with" => Operator::StartsWith,
            "ends_with" => Operator::EndsWith,
            "between_times" => Operator::BetweenTimes,
            "is_logged_in" => Operator::IsLoggedIn,
            "is_not_logged_in" => Operator::IsNotLoggedIn,
            other => Operator::Other(other.to_string()),
        }
    }

    /// the stored operator name
    pub fn name(&self) -> &str {
        match self {
            Operator::Is => "is",
            Operator::IsNot => "is_not",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::BetweenTimes => "between_times",
            Operator::IsLoggedIn => "is_logged_in",
            Operator::IsNotLoggedIn => "is_not_logged_in",
            Operator::Other(name) => name,
        }
    }

    /// phrase used in condition descriptions
    fn phrase(&self) -> &str {
        match self {
            Operator::Is => "is",
            Operator::IsNot => "is not",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts with",
            Operator::EndsWith => "ends with",
            Operator::BetweenTimes => "between",
            Operator::IsLoggedIn => "is logged in",
            Operator::IsNotLoggedIn => "is not logged in",
            Operator::Other(name) => name,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// a single typed predicate over the visitor context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub kind: ConditionKind,
    pub operator: Operator,
    /// comparison value; "HH:MM-HH:MM" for time ranges, expression source for `custom_js`
    pub value: String,
    pub enabled: bool,
}

impl Condition {
    /// create an enabled condition
    pub fn new(kind: ConditionKind, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            kind,
            operator,
            value: value.into(),
            enabled: true,
        }
    }

    /// create an enabled condition from stored type and operator names
    pub fn from_names(kind: &str, operator: &str, value: impl Into<String>) -> Self {
        Self::new(ConditionKind::parse(kind), Operator::parse(operator), value)
    }

    /// set the enabled flag
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// human-readable description, e.g. `Device is desktop` or `URL contains "pricing"`
impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.kind.label();
        match (&self.kind, &self.operator) {
            (ConditionKind::Unknown(name), _) => write!(f, "Unknown condition type \"{}\"", name),
            (ConditionKind::EditorMode, _) => write!(f, "Editor mode is active"),
            (ConditionKind::Expression, _) => write!(f, "Expression `{}`", self.value.trim()),
            (ConditionKind::UserStatus, op @ (Operator::IsLoggedIn | Operator::IsNotLoggedIn)) => {
                write!(f, "{} {}", label, op.phrase())
            }
            (ConditionKind::DateTime, Operator::BetweenTimes) => {
                write!(f, "{} between {}", label, self.value)
            }
            (ConditionKind::Device | ConditionKind::Browser | ConditionKind::Language, op) => {
                write!(f, "{} {} {}", label, op.phrase(), self.value)
            }
            (_, op) => write!(f, "{} {} \"{}\"", label, op.phrase(), self.value),
        }
    }
}

/// an AND/OR combination of conditions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionGroup {
    pub logic: Logic,
    pub conditions: Vec<Condition>,
    pub enabled: bool,
}

impl ConditionGroup {
    /// create an enabled group
    pub fn new(logic: Logic, conditions: Vec<Condition>) -> Self {
        Self {
            logic,
            conditions,
            enabled: true,
        }
    }

    /// create an enabled AND group
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self::new(Logic::And, conditions)
    }

    /// create an enabled OR group
    pub fn any(conditions: Vec<Condition>) -> Self {
        Self::new(Logic::Or, conditions)
    }

    /// set the enabled flag
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl fmt::Display for ConditionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = match self.logic {
            Logic::And => " AND ",
            Logic::Or => " OR ",
        };
        write!(f, "(")?;
        let mut first = true;
        for c in self.conditions.iter().filter(|c| c.enabled) {
            if !first {
                write!(f, "{}", sep)?;
            }
            first = false;
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}

/// the full set of groups for one section, combined with AND
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTree {
    pub groups: Vec<ConditionGroup>,
}

impl RuleTree {
    /// create a tree from groups
    pub fn new(groups: Vec<ConditionGroup>) -> Self {
        Self { groups }
    }

    /// check if the tree has no groups (always visible)
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
