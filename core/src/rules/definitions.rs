//! Rule definition types, as they appear in TOML files.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Root structure for a rule TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleDefinition>,
}

/// One state mutation triggered by an event type.
///
/// ```toml
/// [[rule]]
/// event = "cheer"
/// tag = "bits_total"
/// op = "inc"
/// value = "event.bits"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Canonical or provider event type name
    pub event: String,
    pub tag: String,
    pub op: RuleOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RuleValue>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl RuleDefinition {
    pub fn new(event: &str, tag: &str, op: RuleOp, value: Option<RuleValue>) -> Self {
        Self {
            event: event.to_string(),
            tag: tag.to_string(),
            op,
            value,
            enabled: true,
        }
    }

    /// Where the operand comes from, if the rule has one
    pub fn source(&self) -> Option<ValueSource<'_>> {
        self.value.as_ref().map(RuleValue::source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleOp {
    /// Assign a literal or event field
    Set,
    /// Add to the current numeric value (missing counts as 0)
    Inc,
    /// Keep the larger of current and candidate
    Max,
    /// Fire a trigger: assign a literal, `"1"` by default
    Do,
    /// Kept so the engine can report it instead of failing the whole file
    Unknown(String),
}

impl From<String> for RuleOp {
    fn from(s: String) -> Self {
        match s.as_str() {
            "set" => Self::Set,
            "inc" => Self::Inc,
            "max" => Self::Max,
            "do" => Self::Do,
            _ => Self::Unknown(s),
        }
    }
}

impl From<RuleOp> for String {
    fn from(op: RuleOp) -> Self {
        op.as_str().to_string()
    }
}

impl RuleOp {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Set => "set",
            Self::Inc => "inc",
            Self::Max => "max",
            Self::Do => "do",
            Self::Unknown(name) => name,
        }
    }
}

/// Operand as written in TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

const EVENT_PREFIX: &str = "event.";

/// Resolved meaning of a [`RuleValue`]
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource<'a> {
    Literal(Cow<'a, str>),
    /// Dot path into the event view, without the `event.` prefix
    EventPath(&'a str),
}

impl RuleValue {
    pub fn source(&self) -> ValueSource<'_> {
        match self {
            Self::Text(s) => match s.strip_prefix(EVENT_PREFIX) {
                Some(path) if !path.is_empty() => ValueSource::EventPath(path),
                _ => ValueSource::Literal(Cow::Borrowed(s)),
            },
            Self::Integer(n) => ValueSource::Literal(Cow::Owned(n.to_string())),
            Self::Float(n) => ValueSource::Literal(Cow::Owned(crate::lookup::format_number(*n))),
            Self::Bool(b) => ValueSource::Literal(Cow::Owned(b.to_string())),
        }
    }
}
