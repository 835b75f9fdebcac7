//! End-to-end scenarios for the pipeline in virtual time.
//!
//! Payloads use the provider's webhook envelope so normalization runs too.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use super::pipeline::NotificationPipeline;
use crate::scheduler::QueuedNotification;

fn pipeline() -> NotificationPipeline {
    NotificationPipeline::with_defaults().unwrap()
}

fn envelope(kind: &str, id: &str, event: Value) -> Value {
    json!({
        "subscription": {"type": kind, "version": "1"},
        "event": event,
        "message_id": id,
    })
}

fn follow(id: &str, name: &str) -> Value {
    envelope(
        "channel.follow",
        id,
        json!({"user_id": format!("u-{name}"), "user_login": name.to_lowercase(), "user_name": name}),
    )
}

fn raid(id: &str, from: &str, viewers: u64) -> Value {
    envelope(
        "channel.raid",
        id,
        json!({
            "from_broadcaster_user_id": "99",
            "from_broadcaster_user_login": from.to_lowercase(),
            "from_broadcaster_user_name": from,
            "to_broadcaster_user_id": "1",
            "to_broadcaster_user_name": "Host",
            "viewers": viewers
        }),
    )
}

fn cheer(id: &str, bits: u64) -> Value {
    envelope(
        "channel.cheer",
        id,
        json!({"user_id": "7", "user_name": "Cheery", "is_anonymous": false, "bits": bits}),
    )
}

fn gift(id: &str, gifter: &str, recipient: &str) -> Value {
    envelope(
        "channel.subscription.gift",
        id,
        json!({
            "user_id": format!("u-{gifter}"),
            "user_name": gifter,
            "tier": "1000",
            "total": 1,
            "is_anonymous": false,
            "recipient_user_name": recipient
        }),
    )
}

fn subscribe(id: &str, name: &str) -> Value {
    envelope(
        "channel.subscribe",
        id,
        json!({"user_id": "5", "user_name": name, "tier": "1000", "is_gift": false}),
    )
}

fn current_id(p: &NotificationPipeline) -> Option<String> {
    p.current().map(|n| n.id.clone())
}

#[test]
fn test_gift_bomb_updates_a_single_entry() {
    let mut p = pipeline();
    p.ingest(&raid("r1", "Raider", 40), 0);
    p.ingest(&gift("g1", "Santa", "A"), 100);
    p.ingest(&gift("g2", "Santa", "B"), 1_100);

    p.advance_to(1_200);
    assert_eq!(p.queued().len(), 1);
    assert_eq!(p.queued()[0].id, "gift-bomb-g1");
    assert_eq!(p.queued()[0].count, 2);

    // Raid ends at 8000, bomb takes the slot
    p.advance_to(8_000);
    assert_eq!(current_id(&p).as_deref(), Some("gift-bomb-g1"));

    // Window closes 8s after the last gift; the final revision lands in place
    p.advance_to(9_100);
    let current = p.current().unwrap();
    assert_eq!(current.id, "gift-bomb-g1");
    assert!(current.event.is_final());
    assert_eq!(current.event.raw["recipients"], json!(["A", "B"]));
    assert!(p.queued().is_empty(), "no duplicate entry for the final event");

    // Rules saw each individual gift exactly once
    assert_eq!(p.state().get("gifted_total"), Some("2"));
    assert_eq!(p.state().get("latest_gifter"), Some("Santa"));
}

#[test]
fn test_bomb_template_sees_merged_total() {
    let mut p = pipeline();
    p.ingest(&gift("g1", "Santa", "A"), 0);
    p.ingest(&gift("g2", "Santa", "B"), 1_000);
    p.advance_to(1_100);

    let tpl = "total=[[[event.total]]] gift_count=[[[event.gift_count]]]";
    assert_eq!(p.render_current(tpl).text, "total=2 gift_count=2");

    p.ingest(&gift("g3", "Santa", "C"), 2_000);
    p.advance_to(10_000);
    assert!(p.current().unwrap().event.is_final());
    assert_eq!(p.render_current(tpl).text, "total=3 gift_count=3");
}

#[test]
fn test_lone_gift_waits_for_full_window() {
    let mut p = pipeline();
    let outcome = p.ingest(&gift("g1", "Santa", "A"), 0).unwrap();
    assert_eq!(outcome.forwarded, 0);
    assert!(p.current().is_none());

    p.advance_to(7_999);
    assert!(p.current().is_none());
    p.advance_to(8_000);
    let shown = p.current().unwrap();
    assert_eq!(shown.id, "g1");
    assert!(!shown.event.is_revision());
}

#[test]
fn test_raid_preempts_queued_follow() {
    let mut p = pipeline();
    p.ingest(&subscribe("s1", "Sub"), 0);
    p.ingest(&follow("f1", "Ann"), 10);
    p.ingest(&raid("r1", "Raider", 12), 11);

    assert_eq!(current_id(&p).as_deref(), Some("s1"));
    p.advance_to(5_000);
    assert_eq!(current_id(&p).as_deref(), Some("r1"));
    p.advance_to(13_000);
    assert_eq!(current_id(&p).as_deref(), Some("f1"));
}

#[test]
fn test_follow_burst_groups_and_renders_count() {
    let mut p = pipeline();
    p.ingest(&raid("r1", "Raider", 3), 0);
    p.ingest(&follow("f1", "Ann"), 100);
    p.ingest(&follow("f2", "Bob"), 1_100);
    p.ingest(&follow("f3", "Cy"), 2_100);
    p.ingest(&follow("f4", "Di"), 4_000);

    assert_eq!(p.queued().len(), 2);
    assert_eq!(p.queued()[0].count, 3);
    assert_eq!(p.state().get("follower_count"), Some("4"));
    assert_eq!(p.state().get("latest_follower"), Some("Di"));

    p.advance_to(8_000);
    let out = p.render_current(
        "[[[if:notification.count>1]]][[[event.actor_name]]] and [[[notification.count]]] followers[[[else]]]new follower[[[endif]]]",
    );
    assert_eq!(out.text, "Ann and 3 followers");
    assert!(out.warnings.is_empty());
}

#[test]
fn test_cheer_updates_state_and_template() {
    let mut p = pipeline();
    p.ingest(&cheer("c1", 150), 0);
    let big = "[[[if:event.bits>100]]]Big[[[else]]]Small[[[endif]]] [[[bits_total|thousands]]]";
    assert_eq!(p.render_current(big).text, "Big 150");

    p.advance_to(4_000);
    p.ingest(&cheer("c2", 50), 4_000);
    p.ingest(&cheer("c3", 1_000), 4_001);
    assert_eq!(p.render_current(big).text, "Small 1,200");
    assert_eq!(p.state().get("top_cheer"), Some("1000"));
}

#[test]
fn test_render_without_notification_uses_state_only() {
    let mut p = pipeline();
    p.state_mut().set("follower_count", "12");
    let out = p.render_current("[[[follower_count]]]/[[[event.actor_name]]]/[[[notification.count]]]");
    assert_eq!(out.text, "12//");
}

#[test]
fn test_display_sink_sees_each_change() {
    let mut p = pipeline();
    let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    p.add_display_sink(move |n: Option<&QueuedNotification>| {
        sink_seen.lock().unwrap().push(n.map(|n| n.id.clone()));
    });

    p.ingest(&follow("f1", "Ann"), 0);
    p.ingest(&raid("r1", "Raider", 5), 10);
    p.advance_to(60_000);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some("f1".to_string()), Some("r1".to_string()), None]
    );
}

#[test]
fn test_stream_events_change_state_without_notifications() {
    let mut p = pipeline();
    let online = json!({
        "subscription": {"type": "stream.online"},
        "event": {"broadcaster_user_id": "1", "broadcaster_user_name": "Host", "started_at": "2024-01-01T00:00:00Z"}
    });
    let outcome = p.ingest(&online, 0).unwrap();
    assert_eq!(outcome.admitted, 0);
    assert_eq!(outcome.rules.changed, vec!["stream_status".to_string()]);
    assert_eq!(p.state().get("stream_status"), Some("live"));
    assert!(p.current().is_none());
}

#[test]
fn test_flush_all_and_shutdown() {
    let mut p = pipeline();
    p.ingest(&gift("g1", "Santa", "A"), 0);
    p.ingest(&gift("g2", "Santa", "B"), 10);
    assert_eq!(p.aggregator().active_buffers(), 1);

    assert_eq!(p.flush_all(20), 1);
    assert_eq!(p.aggregator().active_buffers(), 0);
    assert!(p.current().unwrap().event.is_final());

    p.ingest(&follow("f1", "Ann"), 30);
    p.shutdown(40);
    assert!(p.is_closed());
    assert!(p.current().is_none());
    assert!(p.queued().is_empty());
    assert_eq!(p.next_deadline(), None);
    assert!(p.ingest(&follow("f2", "Bob"), 50).is_none());
    assert_eq!(p.state().get("follower_count"), Some("1"));
}

#[test]
fn test_time_never_runs_backwards() {
    let mut p = pipeline();
    p.ingest(&follow("f1", "Ann"), 5_000);
    p.ingest(&raid("r1", "Raider", 1), 1_000);
    assert_eq!(p.now(), Some(5_000));
    assert_eq!(p.queued()[0].enqueued_at, 5_000);
}
