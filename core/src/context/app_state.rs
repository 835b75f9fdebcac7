use std::path::PathBuf;

use chrono::Utc;

use herald_types::PipelineConfig;

use super::pipeline::NotificationPipeline;
use crate::rules::{RuleSet, default_custom_dir, load_rules};

const APP_NAME: &str = "herald";

/// A pipeline driven by a manually advanced virtual clock, plus the config it
/// was built from. Used by the interactive tools.
#[derive(Debug)]
pub struct AppState {
    pub config: PipelineConfig,
    pub pipeline: NotificationPipeline,
    /// Virtual epoch millis
    pub clock_ms: i64,
}

impl AppState {
    /// Load config with confy (defaults if missing or unreadable) and start
    /// the clock at the current wall time.
    pub fn new() -> Self {
        let config = confy::load(APP_NAME, None).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not load config, using defaults");
            PipelineConfig::default()
        });
        Self::from_config(config, Utc::now().timestamp_millis())
    }

    pub fn from_config(config: PipelineConfig, clock_ms: i64) -> Self {
        let rules = Self::load_rule_set(&config);
        let pipeline = NotificationPipeline::new(&config, rules);
        Self {
            config,
            pipeline,
            clock_ms,
        }
    }

    fn load_rule_set(config: &PipelineConfig) -> RuleSet {
        let dir = Self::rules_dir_for(config);
        load_rules(dir.as_deref()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Rule loading failed, continuing without rules");
            RuleSet::new()
        })
    }

    fn rules_dir_for(config: &PipelineConfig) -> Option<PathBuf> {
        config
            .rules_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(default_custom_dir)
    }

    /// Directory custom rules are read from
    pub fn rules_dir(&self) -> Option<PathBuf> {
        Self::rules_dir_for(&self.config)
    }

    /// Re-read the rules directory, keeping state and queue
    pub fn reload_rules(&mut self) -> usize {
        let rules = Self::load_rule_set(&self.config);
        let count = rules.len();
        self.pipeline.set_rules(rules);
        count
    }

    /// Move the clock forward and fire whatever fell due
    pub fn advance(&mut self, ms: i64) -> usize {
        self.clock_ms += ms.max(0);
        self.pipeline.advance_to(self.clock_ms)
    }

    pub fn config_path() -> Option<PathBuf> {
        confy::get_configuration_file_path(APP_NAME, None).ok()
    }

    pub fn save_config(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, None, &self.config)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_drives_pipeline_timers() {
        let config = PipelineConfig {
            rules_dir: Some("/nonexistent/herald/rules".to_string()),
            ..Default::default()
        };
        let mut app = AppState::from_config(config, 1_000);
        assert!(!app.pipeline.rules().is_empty(), "builtin rules loaded");

        let raw = serde_json::json!({
            "subscription": {"type": "channel.follow"},
            "event": {"user_id": "1", "user_name": "Ann"}
        });
        app.pipeline.ingest(&raw, app.clock_ms);
        assert!(app.pipeline.current().is_some());

        app.advance(2_999);
        assert!(app.pipeline.current().is_some());
        app.advance(1);
        assert!(app.pipeline.current().is_none());
        assert_eq!(app.clock_ms, 4_000);
        assert_eq!(app.rules_dir(), Some(PathBuf::from("/nonexistent/herald/rules")));
    }
}
