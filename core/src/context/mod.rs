mod app_state;
mod pipeline;

#[cfg(test)]
mod pipeline_tests;

pub use app_state::AppState;
pub use pipeline::{IngestOutcome, NotificationPipeline};
