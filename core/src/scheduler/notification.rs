use phf::phf_map;
use serde::Serialize;

use herald_types::SchedulerConfig;

use crate::events::{EventType, NormalizedEvent};

/// Display priority by canonical type; higher shows first
static PRIORITIES: phf::Map<&'static str, u8> = phf_map! {
    "raid" => 10,
    "subscription-gift" => 9,
    "subscribe" => 8,
    "subscription-message" => 8,
    "cheer" => 6,
    "follow" => 5,
};

/// Static display time by canonical type
static BASE_DURATIONS: phf::Map<&'static str, i64> = phf_map! {
    "raid" => 8_000,
    "subscription-gift" => 6_000,
    "subscribe" => 5_000,
    "subscription-message" => 5_000,
    "cheer" => 4_000,
    "follow" => 3_000,
};

const FALLBACK_PRIORITY: u8 = 1;
const FALLBACK_DURATION_MS: i64 = 5_000;

pub fn priority_for(event_type: &EventType) -> u8 {
    PRIORITIES
        .get(event_type.as_str())
        .copied()
        .unwrap_or(FALLBACK_PRIORITY)
}

pub fn base_duration_ms(event_type: &EventType) -> i64 {
    BASE_DURATIONS
        .get(event_type.as_str())
        .copied()
        .unwrap_or(FALLBACK_DURATION_MS)
}

/// Gift bombs scale with their size
fn gift_bomb_duration_ms(count: u32) -> i64 {
    match count {
        50.. => 10_000,
        20.. => 8_000,
        5.. => 6_000,
        _ => 5_000,
    }
}

/// Provider-aggregated gifts and anything the aggregator synthesized
pub(crate) fn is_gift_bomb(event: &NormalizedEvent) -> bool {
    event.event_type == EventType::SubscriptionGift
        && (event.gift_count.unwrap_or(1) > 1 || event.is_revision())
}

/// How long an entry for `event` stays on screen when it represents `count` events
pub fn display_duration_ms(event: &NormalizedEvent, count: u32, config: &SchedulerConfig) -> i64 {
    if is_gift_bomb(event) {
        gift_bomb_duration_ms(event.gift_count.unwrap_or(count))
    } else if count > 1 {
        base_duration_ms(&event.event_type) + i64::from(count) * config.group_step_ms
    } else {
        base_duration_ms(&event.event_type)
    }
}

/// One entry in the notification queue or on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedNotification {
    pub id: String,
    pub event: NormalizedEvent,
    pub priority: u8,
    pub enqueued_at: i64,
    pub display_duration_ms: i64,
    /// Set only for groupable types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub displayed_at: Option<i64>,
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl QueuedNotification {
    pub(crate) fn new(event: NormalizedEvent, now: i64, seq: u64, config: &SchedulerConfig) -> Self {
        let count = if is_gift_bomb(&event) {
            event.gift_count.unwrap_or(1).max(1)
        } else {
            1
        };
        let group_key = is_groupable(&event.event_type).then(|| event.event_type.to_string());
        Self {
            id: event.id.clone(),
            priority: priority_for(&event.event_type),
            enqueued_at: now,
            display_duration_ms: display_duration_ms(&event, count, config),
            group_key,
            count,
            displayed_at: None,
            seq,
            event,
        }
    }

    /// Queue order: priority descending, then arrival, then insertion
    pub(crate) fn sort_key(&self) -> (std::cmp::Reverse<u8>, i64, u64) {
        (std::cmp::Reverse(self.priority), self.enqueued_at, self.seq)
    }

    /// Compact JSON used by templates under `notification`
    pub fn to_view(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "type": self.event.event_type.as_str(),
            "count": self.count,
            "priority": self.priority,
            "duration_ms": self.display_duration_ms,
        })
    }
}

pub(crate) fn is_groupable(event_type: &EventType) -> bool {
    matches!(event_type, EventType::Follow | EventType::Cheer)
}

pub(crate) fn is_notifiable(event_type: &EventType) -> bool {
    matches!(
        event_type,
        EventType::Subscribe
            | EventType::SubscriptionGift
            | EventType::SubscriptionMessage
            | EventType::Raid
            | EventType::Follow
            | EventType::Cheer
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_table() {
        assert_eq!(priority_for(&EventType::Raid), 10);
        assert_eq!(priority_for(&EventType::SubscriptionGift), 9);
        assert_eq!(priority_for(&EventType::Follow), 5);
        assert_eq!(priority_for(&EventType::StreamOnline), 1);
    }

    #[test]
    fn test_durations() {
        let config = SchedulerConfig::default();
        let follow = NormalizedEvent::new("f", EventType::Follow, 0);
        assert_eq!(display_duration_ms(&follow, 1, &config), 3_000);
        assert_eq!(display_duration_ms(&follow, 3, &config), 3_600);

        let mut bomb = NormalizedEvent::new("g", EventType::SubscriptionGift, 0);
        bomb.gift_count = Some(1);
        assert_eq!(display_duration_ms(&bomb, 1, &config), 6_000, "single gift");
        for (count, expected) in [(2, 5_000), (5, 6_000), (20, 8_000), (50, 10_000), (120, 10_000)] {
            bomb.gift_count = Some(count);
            assert_eq!(display_duration_ms(&bomb, count, &config), expected);
        }

        let unknown = NormalizedEvent::new("x", EventType::Other("x".into()), 0);
        assert_eq!(display_duration_ms(&unknown, 1, &config), 5_000);
    }
}
