//! Gift-bomb aggregation.
//!
//! Rapid single-gift events from one gifter at one tier are merged into a
//! single notification. Once a burst reaches `min_bomb_size` it goes "live":
//! throttled live-update events (all sharing one id) report the growing
//! count, and a final event closes the burst when the sliding window expires.
//!
//! Per key: empty -> collecting -> live -> flushed.

use hashbrown::HashMap;
use serde_json::{Map, Value};

use herald_types::AggregatorConfig;

use crate::events::{
    EventType, FINAL_MARKER, LIVE_UPDATE_MARKER, NormalizedEvent, RECIPIENTS_KEY, event_blob,
    event_blob_mut,
};
use crate::timers::{TimerId, TimerWheel};

/// Buffers are keyed by gifter and tier, so a tier-1 and tier-3 burst from
/// the same gifter stay separate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferKey {
    pub gifter_user_id: String,
    pub tier: String,
}

impl BufferKey {
    pub fn for_event(event: &NormalizedEvent) -> Self {
        let gifter_user_id = event
            .actor_id
            .clone()
            .or_else(|| event.gifter_name.clone())
            .unwrap_or_else(|| "anonymous".to_string());
        Self {
            gifter_user_id,
            tier: event.tier.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GiftBombBuffer {
    pub gifter_name: Option<String>,
    pub gifter_user_id: String,
    pub tier: String,
    pub events: Vec<NormalizedEvent>,
    pub first_event_time: i64,
    pub last_event_time: i64,
    pub last_live_update_time: Option<i64>,
    /// Count carried by the most recent live update (0 before the first)
    pub last_emitted_count: usize,
    pub flush_timer: Option<TimerId>,
    /// Initial live-update delay, then the trailing throttle timer
    pub live_timer: Option<TimerId>,
    pub is_live: bool,
    pub live_event_id: String,
}

impl GiftBombBuffer {
    pub fn count(&self) -> usize {
        self.events.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregatorTimer {
    Flush(BufferKey),
    LiveUpdate(BufferKey),
}

#[derive(Debug)]
pub struct GiftBombAggregator {
    config: AggregatorConfig,
    buffers: HashMap<BufferKey, GiftBombBuffer>,
    timers: TimerWheel<AggregatorTimer>,
}

impl GiftBombAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            buffers: HashMap::new(),
            timers: TimerWheel::new(),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Feed one normalized event arriving at `now`.
    ///
    /// Returns the events to forward immediately: the event itself when it
    /// is not aggregated, or a live update when the throttle allows one.
    pub fn accept(&mut self, event: NormalizedEvent, now: i64) -> Vec<NormalizedEvent> {
        if !Self::should_buffer(&event) {
            return vec![event];
        }

        let key = BufferKey::for_event(&event);
        let window_ms = self.config.window_ms;

        let buffer = self.buffers.entry(key.clone()).or_insert_with(|| {
            tracing::debug!(
                gifter = %key.gifter_user_id,
                tier = %key.tier,
                "New gift buffer"
            );
            GiftBombBuffer {
                gifter_name: event.gifter_name.clone(),
                gifter_user_id: key.gifter_user_id.clone(),
                tier: key.tier.clone(),
                events: Vec::new(),
                first_event_time: now,
                last_event_time: now,
                last_live_update_time: None,
                last_emitted_count: 0,
                flush_timer: None,
                live_timer: None,
                is_live: false,
                live_event_id: format!("gift-bomb-{}", event.id),
            }
        });

        buffer.events.push(event);
        buffer.last_event_time = now;

        // Sliding window: every gift pushes the flush out
        if let Some(old) = buffer.flush_timer.take() {
            self.timers.cancel(old);
        }
        buffer.flush_timer = Some(
            self.timers
                .schedule(now + window_ms, AggregatorTimer::Flush(key.clone())),
        );

        let count = buffer.count();

        if !buffer.is_live {
            if count >= self.config.min_bomb_size {
                buffer.is_live = true;
                tracing::debug!(id = %buffer.live_event_id, count, "Gift bomb is live");
                let deadline = now + self.config.live_update_delay_ms;
                buffer.live_timer = Some(
                    self.timers
                        .schedule(deadline, AggregatorTimer::LiveUpdate(key)),
                );
            }
            return Vec::new();
        }

        // Live but the initial delayed update hasn't gone out; it will carry this count
        let Some(last_update) = buffer.last_live_update_time else {
            return Vec::new();
        };

        let new_events = count.saturating_sub(buffer.last_emitted_count);
        let elapsed = now - last_update;
        if new_events >= self.config.live_update_every_events
            || elapsed >= self.config.live_update_interval_ms
        {
            if let Some(old) = buffer.live_timer.take() {
                self.timers.cancel(old);
            }
            buffer.last_live_update_time = Some(now);
            buffer.last_emitted_count = count;
            return vec![synthesize(buffer, LIVE_UPDATE_MARKER)];
        }

        if buffer.live_timer.is_none() {
            let deadline = last_update + self.config.live_update_interval_ms;
            buffer.live_timer = Some(
                self.timers
                    .schedule(deadline, AggregatorTimer::LiveUpdate(key)),
            );
        }
        Vec::new()
    }

    /// Gift events with a provider-side total above one are already aggregated
    fn should_buffer(event: &NormalizedEvent) -> bool {
        event.event_type == EventType::SubscriptionGift
            && event.gift_count.unwrap_or(1) <= 1
            && !event.is_revision()
    }

    pub fn next_deadline(&self) -> Option<i64> {
        self.timers.next_deadline()
    }

    /// Fire every timer due at or before `now`, returning emitted events in order
    pub fn fire_due(&mut self, now: i64) -> Vec<NormalizedEvent> {
        let mut out = Vec::new();
        while let Some((id, deadline, timer)) = self.timers.pop_due(now) {
            match timer {
                AggregatorTimer::Flush(key) => self.on_flush(&key, id, &mut out),
                AggregatorTimer::LiveUpdate(key) => {
                    self.on_live_update(&key, id, deadline, &mut out)
                }
            }
        }
        out
    }

    fn on_flush(&mut self, key: &BufferKey, id: TimerId, out: &mut Vec<NormalizedEvent>) {
        let current = self.buffers.get(key).and_then(|b| b.flush_timer);
        if current != Some(id) {
            tracing::debug!(?key, "Stale flush timer");
            return;
        }
        if let Some(buffer) = self.buffers.remove(key) {
            self.finish(buffer, out);
        }
    }

    fn on_live_update(
        &mut self,
        key: &BufferKey,
        id: TimerId,
        now: i64,
        out: &mut Vec<NormalizedEvent>,
    ) {
        let Some(buffer) = self.buffers.get_mut(key) else {
            return;
        };
        if buffer.live_timer != Some(id) {
            return;
        }
        buffer.live_timer = None;

        let count = buffer.count();
        if count == buffer.last_emitted_count {
            return;
        }
        buffer.last_live_update_time = Some(now);
        buffer.last_emitted_count = count;
        out.push(synthesize(buffer, LIVE_UPDATE_MARKER));
    }

    /// Close a buffer: one final event for a bomb, otherwise the gifts as they came
    fn finish(&mut self, mut buffer: GiftBombBuffer, out: &mut Vec<NormalizedEvent>) {
        for timer in [buffer.live_timer.take(), buffer.flush_timer.take()]
            .into_iter()
            .flatten()
        {
            self.timers.cancel(timer);
        }

        if buffer.count() >= self.config.min_bomb_size {
            tracing::info!(
                id = %buffer.live_event_id,
                gifter = buffer.gifter_name.as_deref().unwrap_or("unknown"),
                count = buffer.count(),
                "Finalized gift bomb"
            );
            out.push(synthesize(&buffer, FINAL_MARKER));
        } else {
            tracing::debug!(
                count = buffer.count(),
                gifter = %buffer.gifter_user_id,
                "Releasing buffered gifts"
            );
            out.append(&mut buffer.events);
        }
    }

    /// Flush every open buffer regardless of its window
    pub fn flush_all(&mut self, now: i64) -> Vec<NormalizedEvent> {
        let mut buffers: Vec<_> = self.buffers.drain().map(|(_, b)| b).collect();
        buffers.sort_by_key(|b| b.first_event_time);

        tracing::debug!(buffers = buffers.len(), now, "Force flushing gift buffers");

        let mut out = Vec::new();
        for buffer in buffers {
            self.finish(buffer, &mut out);
        }
        out
    }

    pub fn buffer(&self, key: &BufferKey) -> Option<&GiftBombBuffer> {
        self.buffers.get(key)
    }

    pub fn active_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}

/// Build the merged event for a burst.
///
/// Identity and broadcaster come from the first gift, the timestamp from the
/// latest. Recipients that the provider named are collected into the raw
/// payload alongside the marker.
fn synthesize(buffer: &GiftBombBuffer, marker: &str) -> NormalizedEvent {
    let count = buffer.count();
    let Some(first) = buffer.events.first() else {
        return NormalizedEvent::new(buffer.live_event_id.clone(), EventType::SubscriptionGift, 0);
    };

    let mut event = first.clone();
    event.id = buffer.live_event_id.clone();
    event.ts = buffer.events.last().map_or(first.ts, |e| e.ts);
    event.is_gift = Some(true);
    event.gift_count = Some(u32::try_from(count).unwrap_or(u32::MAX));
    event.gifter_name = buffer.gifter_name.clone().or_else(|| first.gifter_name.clone());

    let recipients: Vec<Value> = buffer
        .events
        .iter()
        .filter_map(|e| {
            event_blob(&e.raw)
                .get("recipient_user_name")
                .and_then(Value::as_str)
                .map(|name| Value::String(name.to_string()))
        })
        .collect();

    let mut raw = match &first.raw {
        Value::Object(map) => Value::Object(map.clone()),
        _ => Value::Object(Map::new()),
    };
    // Templates read the event blob, so the merged total goes there
    if let Some(blob) = event_blob_mut(&mut raw) {
        blob.insert("total".to_string(), Value::from(count));
        blob.insert(RECIPIENTS_KEY.to_string(), Value::Array(recipients.clone()));
    }
    if let Value::Object(envelope) = &mut raw {
        envelope.insert(marker.to_string(), Value::Bool(true));
        envelope.insert(RECIPIENTS_KEY.to_string(), Value::Array(recipients));
    }
    event.raw = raw;
    event
}
