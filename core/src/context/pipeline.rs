//! The owned pipeline context.
//!
//! One [`NotificationPipeline`] holds every stage: aggregator buffers, the
//! notification queue and display slot, overlay state, rules, and the timers
//! behind them. Time is virtual: callers pass epoch millis to every method
//! and the pipeline never reads a clock on its own.

use serde_json::{Map, Value};

use herald_types::PipelineConfig;

use crate::aggregator::GiftBombAggregator;
use crate::error::ConfigError;
use crate::events::{DisplaySink, EventType, NormalizedEvent, normalize_at};
use crate::rules::{ApplyReport, RuleEngine, RuleSet};
use crate::scheduler::{NotificationScheduler, QueuedNotification};
use crate::state::OverlayState;
use crate::template::{RenderOutput, render_with_report};

/// What happened to one ingested event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub event_id: String,
    pub event_type: EventType,
    pub rules: ApplyReport,
    /// Events the aggregator passed on right away (0 while a gift is buffered)
    pub forwarded: usize,
    /// Of those, how many the scheduler kept
    pub admitted: usize,
}

#[derive(Debug)]
pub struct NotificationPipeline {
    aggregator: GiftBombAggregator,
    scheduler: NotificationScheduler,
    engine: RuleEngine,
    state: OverlayState,
    now: i64,
    closed: bool,
}

impl NotificationPipeline {
    pub fn new(config: &PipelineConfig, rules: RuleSet) -> Self {
        Self {
            aggregator: GiftBombAggregator::new(config.aggregator.clone()),
            scheduler: NotificationScheduler::new(config.scheduler.clone()),
            engine: RuleEngine::new(rules),
            state: OverlayState::new(),
            now: i64::MIN,
            closed: false,
        }
    }

    /// Reference configuration with the builtin rules
    pub fn with_defaults() -> Result<Self, ConfigError> {
        Ok(Self::new(&PipelineConfig::default(), RuleSet::builtin()?))
    }

    /// Register a display callback. Sinks hear every promotion, in-place
    /// update and clear of the display slot.
    pub fn add_display_sink(&mut self, sink: impl DisplaySink + Send + 'static) {
        self.scheduler.add_sink(Box::new(sink));
    }

    /// Normalize and process a raw provider payload arriving at `now`
    pub fn ingest(&mut self, raw: &Value, now: i64) -> Option<IngestOutcome> {
        let event = normalize_at(raw, now);
        self.ingest_event(event, now)
    }

    /// Process an already-normalized event.
    ///
    /// Timers due before `now` fire first. The event always reaches the rule
    /// engine; it reaches the scheduler through the aggregator. Returns `None`
    /// after [`shutdown`](Self::shutdown).
    pub fn ingest_event(&mut self, event: NormalizedEvent, now: i64) -> Option<IngestOutcome> {
        if self.closed {
            tracing::warn!(id = %event.id, "Dropping event after shutdown");
            return None;
        }
        let now = self.clamp(now);
        self.advance_to(now);

        tracing::debug!(id = %event.id, event_type = %event.event_type, now, "Ingest");

        let rules = self.engine.apply_event(&event, &mut self.state);
        let event_id = event.id.clone();
        let event_type = event.event_type.clone();

        let forwarded = self.aggregator.accept(event, now);
        let count = forwarded.len();
        let mut admitted = 0;
        for event in forwarded {
            if self.scheduler.enqueue(event, now) {
                admitted += 1;
            }
        }

        Some(IngestOutcome {
            event_id,
            event_type,
            rules,
            forwarded: count,
            admitted,
        })
    }

    /// Fire every timer due at or before `now`, in deadline order.
    ///
    /// Aggregator timers fire before scheduler timers sharing a deadline, so
    /// a bomb finalized at `t` is queued before the display slot frees at `t`.
    /// Returns the number of deadlines processed.
    pub fn advance_to(&mut self, now: i64) -> usize {
        let now = self.clamp(now);
        let mut processed = 0;

        loop {
            let agg = self.aggregator.next_deadline().filter(|d| *d <= now);
            let sched = self.scheduler.next_deadline().filter(|d| *d <= now);
            let deadline = match (agg, sched) {
                (None, None) => break,
                (Some(a), Some(s)) => a.min(s),
                (Some(a), None) => a,
                (None, Some(s)) => s,
            };

            if agg == Some(deadline) {
                for event in self.aggregator.fire_due(deadline) {
                    self.scheduler.enqueue(event, deadline);
                }
            }
            self.scheduler.fire_due(deadline);
            processed += 1;
        }

        self.now = now;
        processed
    }

    /// Earliest pending timer across all stages
    pub fn next_deadline(&self) -> Option<i64> {
        match (self.aggregator.next_deadline(), self.scheduler.next_deadline()) {
            (Some(a), Some(s)) => Some(a.min(s)),
            (a, s) => a.or(s),
        }
    }

    pub fn skip_current(&mut self, now: i64) -> Option<QueuedNotification> {
        let now = self.clamp(now);
        self.advance_to(now);
        self.scheduler.skip_current(now)
    }

    /// Close every gift-bomb buffer now instead of waiting for its window.
    /// Returns how many events were handed to the scheduler.
    pub fn flush_all(&mut self, now: i64) -> usize {
        let now = self.clamp(now);
        self.advance_to(now);
        let flushed = self.aggregator.flush_all(now);
        let count = flushed.len();
        for event in flushed {
            self.scheduler.enqueue(event, now);
        }
        count
    }

    /// Flush buffers, then drop the queue and display slot. Later ingests are
    /// ignored. Overlay state is kept for a final render.
    pub fn shutdown(&mut self, now: i64) {
        if self.closed {
            return;
        }
        self.flush_all(now);
        let dropped = self.scheduler.len() + usize::from(self.scheduler.current().is_some());
        self.scheduler.clear();
        self.closed = true;
        tracing::info!(dropped, "Pipeline shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Latest virtual time seen
    pub fn now(&self) -> Option<i64> {
        (self.now != i64::MIN).then_some(self.now)
    }

    /// Virtual time never runs backwards
    fn clamp(&self, now: i64) -> i64 {
        if now < self.now {
            tracing::debug!(now, latest = self.now, "Clock went backwards");
            self.now
        } else {
            now
        }
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut OverlayState {
        &mut self.state
    }

    pub fn current(&self) -> Option<&QueuedNotification> {
        self.scheduler.current()
    }

    pub fn queued(&self) -> &[QueuedNotification] {
        self.scheduler.queued()
    }

    pub fn aggregator(&self) -> &GiftBombAggregator {
        &self.aggregator
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }

    pub fn rules(&self) -> &RuleSet {
        self.engine.rules()
    }

    pub fn set_rules(&mut self, rules: RuleSet) {
        self.engine.set_rules(rules);
    }

    /// Data for rendering: overlay state, plus `event` and `notification`
    /// while something is on screen
    pub fn render_context(&self) -> Value {
        let mut data = match self.state.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(current) = self.scheduler.current() {
            data.insert("event".to_string(), current.event.to_view());
            data.insert("notification".to_string(), current.to_view());
        }
        Value::Object(data)
    }

    /// Render `template` for what is on screen right now
    pub fn render_current(&self, template: &str) -> RenderOutput {
        render_with_report(template, &self.render_context())
    }
}
