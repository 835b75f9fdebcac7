use crate::scheduler::QueuedNotification;

/// Receives display changes from the notification scheduler.
///
/// Called with the notification that is now on screen, or `None` when the
/// display slot empties. Closures implement this directly.
pub trait DisplaySink {
    fn on_display(&mut self, current: Option<&QueuedNotification>);
}

impl<F> DisplaySink for F
where
    F: FnMut(Option<&QueuedNotification>) + Send,
{
    fn on_display(&mut self, current: Option<&QueuedNotification>) {
        self(current)
    }
}
