use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or saving rule/config files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Serialize error for {path:?}: {source}")]
    Serialize {
        path: PathBuf,
        source: toml::ser::Error,
    },
}

/// Template authoring errors, reported by validation (never by rendering).
///
/// Offsets are byte positions into the template source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("incomplete tag at byte {offset}: {reason}")]
    IncompleteTag { offset: usize, reason: String },

    #[error("nested tag at byte {offset}: '[[[' cannot appear inside another tag")]
    NestedTag { offset: usize },

    #[error("empty tag at byte {offset}: '[[[]]]' has no name")]
    EmptyTag { offset: usize },

    #[error("unexpected [[[{keyword}]]] at byte {offset}: no open [[[if:...]]] block")]
    UnexpectedTag { keyword: &'static str, offset: usize },

    #[error("[[[{keyword}]]] at byte {offset} follows [[[else]]] in the same block")]
    BranchAfterElse { keyword: &'static str, offset: usize },

    #[error("invalid condition at byte {offset}: {reason}")]
    InvalidCondition { offset: usize, reason: String },
}

impl TemplateError {
    pub fn offset(&self) -> usize {
        match self {
            Self::IncompleteTag { offset, .. }
            | Self::NestedTag { offset }
            | Self::EmptyTag { offset }
            | Self::UnexpectedTag { offset, .. }
            | Self::BranchAfterElse { offset, .. }
            | Self::InvalidCondition { offset, .. } => *offset,
        }
    }
}

/// Errors returned by the async service handle
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("pipeline service is not running")]
    Closed,
    #[error("pipeline service dropped the reply")]
    NoReply,
}
