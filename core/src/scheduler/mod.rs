mod notification;
mod queue;

pub use notification::{QueuedNotification, base_duration_ms, display_duration_ms, priority_for};
pub use queue::NotificationScheduler;
