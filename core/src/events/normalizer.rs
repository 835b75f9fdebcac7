//! Raw provider payload -> [`NormalizedEvent`].
//!
//! Normalization is total: every JSON value produces an event. Missing or
//! malformed fields are simply left unset.

use chrono::{DateTime, Utc};
use phf::phf_map;
use serde_json::{Map, Value};

use super::event::{EventType, NormalizedEvent};

/// Where a type's actor and broadcaster identity live in the event blob.
///
/// Each prefix expands to `{prefix}_id`, `{prefix}_login` and `{prefix}_name`.
#[derive(Debug, Clone, Copy)]
struct FieldMap {
    actor: &'static str,
    broadcaster: &'static str,
}

const USER_FIELDS: FieldMap = FieldMap {
    actor: "user",
    broadcaster: "broadcaster_user",
};

/// Per-type extraction table, keyed by canonical type name
static FIELD_MAPS: phf::Map<&'static str, FieldMap> = phf_map! {
    "follow" => USER_FIELDS,
    "subscribe" => USER_FIELDS,
    "subscription-message" => USER_FIELDS,
    "subscription-gift" => USER_FIELDS,
    "cheer" => USER_FIELDS,
    "redemption" => USER_FIELDS,
    "raid" => FieldMap { actor: "from_broadcaster_user", broadcaster: "to_broadcaster_user" },
    "stream-online" => FieldMap { actor: "broadcaster_user", broadcaster: "broadcaster_user" },
    "stream-offline" => FieldMap { actor: "broadcaster_user", broadcaster: "broadcaster_user" },
};

/// Provider timestamp fields, checked in order on the event blob
const TIMESTAMP_FIELDS: &[&str] = &[
    "followed_at",
    "started_at",
    "raided_at",
    "timestamp",
    "redeemed_at",
    "created_at",
];

const ANONYMOUS: &str = "Anonymous";

/// Normalize using the wall clock as the timestamp fallback
pub fn normalize(raw: &Value) -> NormalizedEvent {
    normalize_at(raw, Utc::now().timestamp_millis())
}

/// Normalize with an explicit clock, used when no provider timestamp is present
pub fn normalize_at(raw: &Value, now_ms: i64) -> NormalizedEvent {
    let event_type = EventType::parse(discriminator(raw).unwrap_or(""));
    let blob = event_blob(raw);

    let ts = TIMESTAMP_FIELDS
        .iter()
        .find_map(|field| blob.get(*field).and_then(parse_timestamp))
        .or_else(|| {
            raw.pointer("/metadata/message_timestamp")
                .and_then(parse_timestamp)
        })
        .unwrap_or(now_ms);

    let mut event = NormalizedEvent::new(String::new(), event_type, ts);

    match FIELD_MAPS.get(event.event_type.as_str()) {
        Some(map) => {
            let (id, login, name) = identity(blob, map.actor);
            event.actor_id = id;
            event.actor_login = login;
            event.actor_name = name;
            let (id, login, name) = identity(blob, map.broadcaster);
            event.broadcaster_id = id;
            event.broadcaster_login = login;
            event.broadcaster_name = name;
        }
        None => {
            // Outside the taxonomy: generic user fields, blob first then top level
            let (mut id, mut login, mut name) = identity(blob, "user");
            if id.is_none() && login.is_none() && name.is_none() {
                (id, login, name) = identity(raw, "user");
            }
            event.actor_id = id;
            event.actor_login = login;
            event.actor_name = name;
            let (id, login, name) = identity(blob, "broadcaster_user");
            event.broadcaster_id = id;
            event.broadcaster_login = login;
            event.broadcaster_name = name;
        }
    }

    let anonymous = blob
        .get("is_anonymous")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    match event.event_type {
        EventType::Cheer => {
            if anonymous && event.actor_name.is_none() {
                event.actor_name = Some(ANONYMOUS.to_string());
            }
        }
        EventType::Subscribe | EventType::SubscriptionMessage => {
            event.tier = string_field(blob, "tier");
            event.is_gift = blob.get("is_gift").and_then(Value::as_bool);
        }
        EventType::SubscriptionGift => {
            event.tier = string_field(blob, "tier");
            event.is_gift = Some(true);
            event.gift_count = blob
                .get("total")
                .and_then(Value::as_u64)
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX));
            event.gifter_name = if anonymous {
                Some(ANONYMOUS.to_string())
            } else {
                event.actor_name.clone()
            };
        }
        _ => {}
    }

    event.id = string_field(raw, "message_id")
        .or_else(|| raw.pointer("/metadata/message_id").and_then(scalar_string))
        .unwrap_or_else(|| {
            format!(
                "{}-{}-{}",
                event.event_type,
                event.actor_id.as_deref().unwrap_or("unknown"),
                event.ts
            )
        });
    event.raw = raw.clone();
    event
}

/// First populated type discriminator across the known envelope shapes
fn discriminator(raw: &Value) -> Option<&str> {
    [
        raw.pointer("/subscription/type"),
        raw.pointer("/payload/subscription/type"),
        raw.pointer("/metadata/subscription_type"),
        raw.get("type"),
    ]
    .into_iter()
    .flatten()
    .find_map(Value::as_str)
}

/// The type-specific payload: `event`, else `payload.event`, else the whole object
pub(crate) fn event_blob(raw: &Value) -> &Value {
    raw.get("event")
        .filter(|v| v.is_object())
        .or_else(|| raw.pointer("/payload/event").filter(|v| v.is_object()))
        .unwrap_or(raw)
}

/// Mutable [`event_blob`]. `None` only when `raw` is not an object.
pub(crate) fn event_blob_mut(raw: &mut Value) -> Option<&mut Map<String, Value>> {
    if raw.get("event").is_some_and(Value::is_object) {
        return raw.get_mut("event").and_then(Value::as_object_mut);
    }
    if raw.pointer("/payload/event").is_some_and(Value::is_object) {
        return raw.pointer_mut("/payload/event").and_then(Value::as_object_mut);
    }
    raw.as_object_mut()
}

fn identity(source: &Value, prefix: &str) -> (Option<String>, Option<String>, Option<String>) {
    (
        string_field(source, &format!("{prefix}_id")),
        string_field(source, &format!("{prefix}_login")),
        string_field(source, &format!("{prefix}_name")),
    )
}

fn string_field(source: &Value, key: &str) -> Option<String> {
    source.get(key).and_then(scalar_string)
}

/// Strings and numbers as text; ids arrive as either depending on the sender
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// RFC 3339 string, numeric string, or integer epoch millis
fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .ok()
            .or_else(|| s.trim().parse::<i64>().ok()),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}
