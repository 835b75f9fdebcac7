//! Shared configuration types for Herald.
//!
//! Kept dependency-light so binaries and the core library agree on the
//! on-disk config shape without pulling in the pipeline itself.

pub mod config;
pub mod formatting;

pub use config::{AggregatorConfig, PipelineConfig, SchedulerConfig};
