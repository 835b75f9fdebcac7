mod event;
mod handler;
mod normalizer;

pub use event::{EventType, FINAL_MARKER, LIVE_UPDATE_MARKER, NormalizedEvent, RECIPIENTS_KEY};
pub use handler::DisplaySink;
pub use normalizer::{normalize, normalize_at};

pub(crate) use normalizer::{event_blob, event_blob_mut};
