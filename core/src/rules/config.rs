//! Rule loading.
//!
//! Rules come from two places:
//! - **Builtin**: `definitions/rules.toml`, compiled into the crate
//! - **Custom**: every `*.toml` file in the user's rules directory
//!
//! A custom file that declares rules for an event type replaces the builtin
//! rules for that type; other types keep their builtin rules.

use std::fs;
use std::path::{Path, PathBuf};

use hashbrown::{HashMap, HashSet};

use super::definitions::{RuleConfig, RuleDefinition};
use crate::error::ConfigError;
use crate::events::EventType;

const BUILTIN_RULES: &str = include_str!("../../definitions/rules.toml");

/// Rules grouped by canonical event type, in declaration order
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    by_event: HashMap<String, Vec<RuleDefinition>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled-in rules
    pub fn builtin() -> Result<Self, ConfigError> {
        let config: RuleConfig =
            toml::from_str(BUILTIN_RULES).map_err(|e| ConfigError::Parse {
                path: PathBuf::from("<builtin>/rules.toml"),
                source: e,
            })?;
        let mut set = Self::new();
        set.add_config(config);
        Ok(set)
    }

    /// Append every rule in `config`
    pub fn add_config(&mut self, config: RuleConfig) {
        for rule in config.rules {
            self.push(rule);
        }
    }

    fn push(&mut self, rule: RuleDefinition) {
        let key = EventType::parse(&rule.event).as_str().to_string();
        self.by_event.entry(key).or_default().push(rule);
    }

    /// Merge a custom file. The first custom rule for a type drops whatever
    /// the set held for it before; `overridden` tracks types already replaced.
    fn override_with(&mut self, config: RuleConfig, overridden: &mut HashSet<String>) {
        for rule in config.rules {
            let key = EventType::parse(&rule.event).as_str().to_string();
            if overridden.insert(key.clone()) {
                self.by_event.remove(&key);
            }
            self.push(rule);
        }
    }

    /// Enabled rules for one event type
    pub fn rules_for(&self, event_type: &EventType) -> impl Iterator<Item = &RuleDefinition> {
        self.by_event
            .get(event_type.as_str())
            .into_iter()
            .flatten()
            .filter(|rule| rule.enabled)
    }

    /// Event types that have at least one rule, sorted
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.by_event.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.by_event.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builtin rules overlaid with the custom rules directory, if it exists.
///
/// Unreadable or malformed custom files are logged and skipped.
pub fn load_rules(custom_dir: Option<&Path>) -> Result<RuleSet, ConfigError> {
    let mut set = RuleSet::builtin()?;

    if let Some(dir) = custom_dir {
        if dir.exists() {
            load_directory(&mut set, dir)?;
        }
    }

    tracing::debug!(rules = set.len(), "Loaded rules");
    Ok(set)
}

fn load_directory(set: &mut RuleSet, dir: &Path) -> Result<(), ConfigError> {
    let entries = fs::read_dir(dir).map_err(|e| ConfigError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    let mut overridden = HashSet::new();
    for path in paths {
        match load_file(&path) {
            Ok(config) => {
                tracing::info!(
                    rules = config.rules.len(),
                    file = ?path.file_name(),
                    "Loaded custom rules"
                );
                set.override_with(config, &mut overridden);
            }
            Err(e) => tracing::warn!(file = ?path.file_name(), error = %e, "Skipping rule file"),
        }
    }
    Ok(())
}

/// Load a single rule file
pub fn load_file(path: &Path) -> Result<RuleConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write a rule file
pub fn save_file(path: &Path, config: &RuleConfig) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(config).map_err(|e| ConfigError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;

    fs::write(path, contents).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Default location for custom rule files
pub fn default_custom_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("herald").join("rules"))
}
