//! Canonical event shape shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::normalizer::event_blob;

/// Marker key set on synthesized gift-bomb events while the burst is still growing.
pub const LIVE_UPDATE_MARKER: &str = "is_live_update";
/// Marker key set on the single event that closes a gift bomb.
pub const FINAL_MARKER: &str = "is_final";
/// Raw key holding the recipient names merged into a gift bomb.
pub const RECIPIENTS_KEY: &str = "recipients";

/// Event taxonomy.
///
/// Provider names (`channel.follow`) and canonical names (`follow`) both parse;
/// anything unrecognized is carried through as `Other` so the rule engine can
/// still key rules on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Follow,
    Subscribe,
    SubscriptionMessage,
    SubscriptionGift,
    Raid,
    Cheer,
    StreamOnline,
    StreamOffline,
    Redemption,
    Other(String),
}

impl EventType {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "channel.follow" | "follow" => Self::Follow,
            "channel.subscribe" | "subscribe" => Self::Subscribe,
            "channel.subscription.message" | "subscription-message" => Self::SubscriptionMessage,
            "channel.subscription.gift" | "subscription-gift" => Self::SubscriptionGift,
            "channel.raid" | "raid" => Self::Raid,
            "channel.cheer" | "cheer" => Self::Cheer,
            "stream.online" | "stream-online" => Self::StreamOnline,
            "stream.offline" | "stream-offline" => Self::StreamOffline,
            "channel.channel_points_custom_reward_redemption.add" | "redemption" => {
                Self::Redemption
            }
            "" => Self::Other("unknown".to_string()),
            other => Self::Other(other.to_string()),
        }
    }

    /// Canonical kebab-case name, used as the rule key and in synthesized ids
    pub fn as_str(&self) -> &str {
        match self {
            Self::Follow => "follow",
            Self::Subscribe => "subscribe",
            Self::SubscriptionMessage => "subscription-message",
            Self::SubscriptionGift => "subscription-gift",
            Self::Raid => "raid",
            Self::Cheer => "cheer",
            Self::StreamOnline => "stream-online",
            Self::StreamOffline => "stream-offline",
            Self::Redemption => "redemption",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One platform notification in canonical form.
///
/// Created once by the normalizer and never mutated; stages that need "the same
/// event with more data" build a new value carrying the same `id`. Optional
/// fields are only present when the type's mapping set them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Epoch millis
    pub ts: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcaster_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcaster_login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcaster_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_gift: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gift_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gifter_name: Option<String>,

    /// The provider payload as received, for fields normalization does not hoist
    #[serde(default)]
    pub raw: Value,
}

impl NormalizedEvent {
    /// Minimal event with only the required fields set
    pub fn new(id: impl Into<String>, event_type: EventType, ts: i64) -> Self {
        Self {
            id: id.into(),
            event_type,
            ts,
            broadcaster_id: None,
            broadcaster_login: None,
            broadcaster_name: None,
            actor_id: None,
            actor_login: None,
            actor_name: None,
            tier: None,
            is_gift: None,
            gift_count: None,
            gifter_name: None,
            raw: Value::Null,
        }
    }

    fn raw_flag(&self, key: &str) -> bool {
        self.raw.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Intermediate revision of a growing gift bomb
    pub fn is_live_update(&self) -> bool {
        self.raw_flag(LIVE_UPDATE_MARKER)
    }

    /// Closing revision of a gift bomb
    pub fn is_final(&self) -> bool {
        self.raw_flag(FINAL_MARKER)
    }

    /// Either marker: this event revises a notification that may already exist
    pub fn is_revision(&self) -> bool {
        self.is_live_update() || self.is_final()
    }

    /// A field from the provider's event blob that normalization did not hoist
    pub fn raw_field(&self, key: &str) -> Option<&Value> {
        event_blob(&self.raw).get(key).filter(|v| !v.is_null())
    }

    /// JSON view used by rules and templates.
    ///
    /// Normalized fields sit on top of the provider's event blob, so both
    /// `event.actor_name` and `event.bits` resolve. The full payload stays
    /// reachable under `raw`.
    pub fn to_view(&self) -> Value {
        let mut view = match event_blob(&self.raw) {
            Value::Object(blob) => blob.clone(),
            _ => Map::new(),
        };
        for key in [LIVE_UPDATE_MARKER, FINAL_MARKER, RECIPIENTS_KEY] {
            if let Some(value) = self.raw.get(key) {
                view.insert(key.to_string(), value.clone());
            }
        }
        if let Ok(Value::Object(normalized)) = serde_json::to_value(self) {
            for (key, value) in normalized {
                if key != "raw" {
                    view.insert(key, value);
                }
            }
        }
        view.insert("raw".to_string(), self.raw.clone());
        Value::Object(view)
    }
}
