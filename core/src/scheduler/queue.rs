//! Priority queue with a single display slot.
//!
//! Entries wait in `(priority desc, enqueued_at asc, seq asc)` order. One
//! entry is on screen at a time; when its display timer elapses the next one
//! is promoted and every registered [`DisplaySink`] hears about it.

use herald_types::SchedulerConfig;

use super::notification::{QueuedNotification, display_duration_ms, is_notifiable};
use crate::events::{DisplaySink, NormalizedEvent};
use crate::timers::{TimerId, TimerWheel};

pub struct NotificationScheduler {
    config: SchedulerConfig,
    queue: Vec<QueuedNotification>,
    current: Option<QueuedNotification>,
    display_timer: Option<TimerId>,
    timers: TimerWheel<()>,
    next_seq: u64,
    sinks: Vec<Box<dyn DisplaySink + Send>>,
}

impl std::fmt::Debug for NotificationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationScheduler")
            .field("queued", &self.queue.len())
            .field("current", &self.current.as_ref().map(|n| &n.id))
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl NotificationScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            queue: Vec::new(),
            current: None,
            display_timer: None,
            timers: TimerWheel::new(),
            next_seq: 0,
            sinks: Vec::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn add_sink(&mut self, sink: Box<dyn DisplaySink + Send>) {
        self.sinks.push(sink);
    }

    /// Offer an event at `now`. Returns false if it was dropped.
    pub fn enqueue(&mut self, event: NormalizedEvent, now: i64) -> bool {
        if !is_notifiable(&event.event_type) {
            tracing::debug!(id = %event.id, event_type = %event.event_type, "Ignoring non-notifiable event");
            return false;
        }

        if event.is_revision() {
            match self.apply_revision(event, now) {
                Ok(()) => return true,
                Err(event) => return self.insert(event, now),
            }
        }

        if self.try_group(&event, now) {
            return true;
        }

        self.insert(event, now)
    }

    /// Update an existing entry for a gift bomb in place. Hands the event back
    /// when no entry carries its id.
    fn apply_revision(&mut self, event: NormalizedEvent, now: i64) -> Result<(), NormalizedEvent> {
        let count = event.gift_count.unwrap_or(1).max(1);
        let duration = display_duration_ms(&event, count, &self.config);

        if let Some(current) = self.current.as_mut().filter(|c| c.id == event.id) {
            current.event = event;
            current.count = count;
            current.display_duration_ms = duration;

            let displayed_at = current.displayed_at.unwrap_or(now);
            let old_deadline = self
                .display_timer
                .and_then(|id| self.timers.deadline_of(id))
                .unwrap_or(now);
            let deadline = old_deadline.max(displayed_at + duration);
            if let Some(old) = self.display_timer.take() {
                self.timers.cancel(old);
            }
            self.display_timer = Some(self.timers.schedule(deadline, ()));

            tracing::debug!(
                id = %current.id,
                count,
                ends_at = deadline,
                "Updated displayed notification"
            );
            self.notify();
            return Ok(());
        }

        if let Some(entry) = self.queue.iter_mut().find(|n| n.id == event.id) {
            entry.event = event;
            entry.count = count;
            entry.display_duration_ms = duration;
            tracing::debug!(id = %entry.id, count, "Updated queued notification");
            return Ok(());
        }

        Err(event)
    }

    /// Merge a follow or cheer into a waiting entry of the same type
    fn try_group(&mut self, event: &NormalizedEvent, now: i64) -> bool {
        let key = event.event_type.as_str();
        let window = self.config.grouping_window_ms;
        let Some(entry) = self.queue.iter_mut().find(|n| {
            n.group_key.as_deref() == Some(key)
                && !n.event.is_revision()
                && now - n.enqueued_at <= window
        }) else {
            return false;
        };

        entry.count += 1;
        entry.display_duration_ms = display_duration_ms(&entry.event, entry.count, &self.config);
        tracing::debug!(
            id = %event.id,
            into = %entry.id,
            count = entry.count,
            "Grouped notification"
        );
        true
    }

    fn insert(&mut self, event: NormalizedEvent, now: i64) -> bool {
        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = QueuedNotification::new(event, now, seq, &self.config);
        let key = entry.sort_key();
        let pos = self.queue.partition_point(|n| n.sort_key() <= key);
        self.queue.insert(pos, entry);

        let mut kept = true;
        while self.queue.len() > self.config.max_queue {
            if let Some(dropped) = self.queue.pop() {
                tracing::debug!(id = %dropped.id, "Queue full, dropping notification");
                kept &= dropped.seq != seq;
            }
        }

        if self.current.is_none() {
            self.promote(now);
        }
        kept
    }

    /// Move the head of the queue into the display slot
    fn promote(&mut self, now: i64) {
        if self.current.is_some() || self.queue.is_empty() {
            return;
        }
        let mut next = self.queue.remove(0);
        next.displayed_at = Some(now);
        self.display_timer = Some(self.timers.schedule(now + next.display_duration_ms, ()));
        tracing::info!(
            id = %next.id,
            event_type = %next.event.event_type,
            count = next.count,
            duration_ms = next.display_duration_ms,
            "Displaying notification"
        );
        self.current = Some(next);
        self.notify();
    }

    fn notify(&mut self) {
        let current = self.current.as_ref();
        for sink in &mut self.sinks {
            sink.on_display(current);
        }
    }

    /// End the current notification and promote the next
    fn advance(&mut self, now: i64) -> Option<QueuedNotification> {
        if let Some(id) = self.display_timer.take() {
            self.timers.cancel(id);
        }
        let finished = self.current.take();
        if self.queue.is_empty() {
            if finished.is_some() {
                self.notify();
            }
        } else {
            self.promote(now);
        }
        finished
    }

    pub fn next_deadline(&self) -> Option<i64> {
        self.timers.next_deadline()
    }

    /// Elapse display timers due at or before `now`. Returns finished entries.
    pub fn fire_due(&mut self, now: i64) -> Vec<QueuedNotification> {
        let mut finished = Vec::new();
        while let Some((id, deadline, ())) = self.timers.pop_due(now) {
            if self.display_timer != Some(id) {
                continue;
            }
            self.display_timer = None;
            if let Some(done) = self.advance(deadline) {
                tracing::debug!(id = %done.id, at = deadline, "Notification finished");
                finished.push(done);
            }
        }
        finished
    }

    /// Drop the displayed notification early
    pub fn skip_current(&mut self, now: i64) -> Option<QueuedNotification> {
        let skipped = self.advance(now);
        if let Some(n) = &skipped {
            tracing::info!(id = %n.id, "Skipped notification");
        }
        skipped
    }

    /// Drop everything, including the displayed notification
    pub fn clear(&mut self) {
        self.queue.clear();
        self.timers.clear();
        self.display_timer = None;
        if self.current.take().is_some() {
            self.notify();
        }
    }

    pub fn current(&self) -> Option<&QueuedNotification> {
        self.current.as_ref()
    }

    /// Waiting entries in display order
    pub fn queued(&self) -> &[QueuedNotification] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Nothing displayed and nothing waiting
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }
}
