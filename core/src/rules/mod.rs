//! Declarative overlay-state rules.
//!
//! Each rule names an event type, a state tag and an operation. Rules are
//! loaded from TOML: a builtin set compiled into the crate, then any custom
//! files from the user's config directory.

mod config;
mod definitions;
mod engine;

pub use config::{RuleSet, default_custom_dir, load_file, load_rules, save_file};
pub use definitions::{RuleConfig, RuleDefinition, RuleOp, RuleValue, ValueSource};
pub use engine::{ApplyReport, RuleEngine};
