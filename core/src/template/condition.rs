//! `[[[if:COND]]]` conditions.
//!
//! ```text
//! COND  := IDENT | IDENT OP VALUE
//! OP    := '>' | '<' | '>=' | '<=' | '!=' | '=' | '=='
//! VALUE := bare token | "quoted" | 'quoted'
//! ```
//!
//! When both sides parse as numbers the comparison is numeric. Otherwise
//! ordering operators compare strings lexicographically and equality is exact.

use std::cmp::Ordering;

use serde_json::Value;

use crate::lookup::{parse_number, resolve, value_to_string};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Ge,
    Le,
    Ne,
    Eq,
}

impl CompareOp {
    /// Longest operator at the start of `s`
    fn match_prefix(s: &str) -> Option<(Self, usize)> {
        let two = [
            (">=", Self::Ge),
            ("<=", Self::Le),
            ("!=", Self::Ne),
            ("==", Self::Eq),
        ];
        for (token, op) in two {
            if s.starts_with(token) {
                return Some((op, 2));
            }
        }
        match s.as_bytes().first()? {
            b'>' => Some((Self::Gt, 1)),
            b'<' => Some((Self::Lt, 1)),
            b'=' => Some((Self::Eq, 1)),
            _ => None,
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Gt => ordering == Ordering::Greater,
            Self::Lt => ordering == Ordering::Less,
            Self::Ge => ordering != Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Ne => ordering != Ordering::Equal,
            Self::Eq => ordering == Ordering::Equal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Ne => "!=",
            Self::Eq => "==",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Truthy(String),
    Compare {
        ident: String,
        op: CompareOp,
        value: String,
    },
}

impl Condition {
    /// Parse the text after `if:` / `elseif:`. The error is a human-readable reason.
    pub fn parse(text: &str) -> Result<Self, String> {
        let Some(op_at) = text.find(['>', '<', '=', '!']) else {
            let ident = text.trim();
            if ident.is_empty() {
                return Err("condition is empty".to_string());
            }
            return Ok(Self::Truthy(ident.to_string()));
        };

        let ident = text[..op_at].trim();
        if ident.is_empty() {
            return Err(format!("missing identifier before '{}'", &text[op_at..].trim()));
        }
        let Some((op, len)) = CompareOp::match_prefix(&text[op_at..]) else {
            return Err(format!("unknown operator in '{}'", text.trim()));
        };

        Ok(Self::Compare {
            ident: ident.to_string(),
            op,
            value: unquote(text[op_at + len..].trim()).to_string(),
        })
    }

    /// Identifier the condition reads
    pub fn ident(&self) -> &str {
        match self {
            Self::Truthy(ident) | Self::Compare { ident, .. } => ident,
        }
    }

    pub fn evaluate(&self, data: &Value) -> bool {
        match self {
            Self::Truthy(ident) => resolve(data, ident).is_some_and(is_truthy),
            Self::Compare { ident, op, value } => {
                let lhs = resolve(data, ident)
                    .and_then(value_to_string)
                    .unwrap_or_default();
                compare(&lhs, *op, value)
            }
        }
    }
}

fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    s
}

/// Everything except `false`, `0`, null, missing and the empty string
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "false" || s == "0"),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn compare(lhs: &str, op: CompareOp, rhs: &str) -> bool {
    if let (Some(a), Some(b)) = (parse_number(lhs), parse_number(rhs)) {
        return a.partial_cmp(&b).is_some_and(|ord| op.accepts(ord));
    }
    match op {
        CompareOp::Eq => lhs == rhs,
        CompareOp::Ne => lhs != rhs,
        _ => op.accepts(lhs.cmp(rhs)),
    }
}
