//! Herald core: the event-to-overlay notification pipeline.
//!
//! Raw provider payloads are normalized, run through the overlay rule engine,
//! merged into gift bombs where they belong, and scheduled for display one at
//! a time. The overlay state and the displayed notification feed the
//! conditional template renderer.

pub mod aggregator;
pub mod context;
pub mod error;
pub mod events;
pub mod lookup;
pub mod rules;
pub mod scheduler;
pub mod service;
pub mod state;
pub mod template;
pub mod timers;

pub use aggregator::GiftBombAggregator;
pub use context::{AppState, IngestOutcome, NotificationPipeline};
pub use error::{ConfigError, ServiceError, TemplateError};
pub use events::{DisplaySink, EventType, NormalizedEvent, normalize, normalize_at};
pub use rules::{RuleEngine, RuleSet};
pub use scheduler::{NotificationScheduler, QueuedNotification};
pub use service::{PipelineService, ServiceEvent, ServiceHandle};
pub use state::OverlayState;
pub use template::{RenderOutput, extract_tags, render, render_with_report, validate};

pub use herald_types::{AggregatorConfig, PipelineConfig, SchedulerConfig};
