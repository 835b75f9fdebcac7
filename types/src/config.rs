//! Pipeline tuning knobs.
//!
//! Every field has a serde default so partial config files (or none at all)
//! load cleanly. The defaults are the reference values the pipeline was tuned
//! against for a human-paced overlay.

use serde::{Deserialize, Serialize};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub aggregator: AggregatorConfig,
    pub scheduler: SchedulerConfig,

    /// Extra directory of user rule files, loaded after the builtin rules.
    /// `None` uses the platform config directory.
    pub rules_dir: Option<String>,
}

/// Gift-bomb aggregation timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Sliding window after the most recent gift before a buffer flushes
    pub window_ms: i64,
    /// Buffered gifts needed before a burst is shown as a single bomb
    pub min_bomb_size: usize,
    /// Delay before the first live update, so a "1 gift" alert never flashes
    pub live_update_delay_ms: i64,
    /// Emit a live update after this many new gifts ...
    pub live_update_every_events: usize,
    /// ... or after this much time since the previous update
    pub live_update_interval_ms: i64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            window_ms: 8_000,
            min_bomb_size: 2,
            live_update_delay_ms: 100,
            live_update_every_events: 5,
            live_update_interval_ms: 300,
        }
    }
}

/// Notification queue behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Same-type events within this window of a queued entry merge into it
    pub grouping_window_ms: i64,
    /// Extra display time per merged event
    pub group_step_ms: i64,
    /// Queue capacity; overflow drops the lowest-priority tail
    pub max_queue: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            grouping_window_ms: 3_000,
            group_step_ms: 200,
            max_queue: 100,
        }
    }
}
