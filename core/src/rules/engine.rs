use serde_json::Value;

use super::config::RuleSet;
use super::definitions::{RuleDefinition, RuleOp, ValueSource};
use crate::events::NormalizedEvent;
use crate::lookup::{format_number, get_path_or, parse_number};
use crate::state::OverlayState;

/// Outcome of applying one event's rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Rules that ran (including ones that left the value unchanged)
    pub applied: usize,
    /// Tags whose value actually changed, in rule order
    pub changed: Vec<String>,
    /// `tag: op` for every rule with an operation the engine does not know
    pub unknown_ops: Vec<String>,
    /// Rules skipped because their operand was not numeric
    pub skipped: Vec<String>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.unknown_ops.is_empty() && self.skipped.is_empty()
    }
}

/// Applies a [`RuleSet`] to overlay state. Holds no per-event state.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: RuleSet,
}

impl RuleEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn set_rules(&mut self, rules: RuleSet) {
        self.rules = rules;
    }

    /// Run every enabled rule for the event's type against `state`.
    ///
    /// Never fails: unknown operations and non-numeric operands are reported
    /// and the remaining rules still run.
    pub fn apply_event(&self, event: &NormalizedEvent, state: &mut OverlayState) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut view: Option<Value> = None;

        for rule in self.rules.rules_for(&event.event_type) {
            let operand = match rule.source() {
                None => None,
                Some(ValueSource::Literal(text)) => Some(text.into_owned()),
                Some(ValueSource::EventPath(path)) => {
                    let view = view.get_or_insert_with(|| event.to_view());
                    Some(get_path_or(view, path, ""))
                }
            };

            let before = state.get(&rule.tag).map(str::to_string);
            match apply_rule(rule, operand, state) {
                Outcome::Applied => report.applied += 1,
                Outcome::NotNumeric => {
                    tracing::debug!(
                        event_type = %event.event_type,
                        op = rule.op.as_str(),
                        tag = %rule.tag,
                        "Rule operand is not numeric, skipping"
                    );
                    report.skipped.push(rule.tag.clone());
                    continue;
                }
                Outcome::UnknownOp => {
                    tracing::warn!(
                        op = rule.op.as_str(),
                        tag = %rule.tag,
                        event_type = %event.event_type,
                        "Unknown rule op"
                    );
                    report
                        .unknown_ops
                        .push(format!("{}: {}", rule.tag, rule.op.as_str()));
                    continue;
                }
            }
            if state.get(&rule.tag) != before.as_deref() {
                report.changed.push(rule.tag.clone());
            }
        }

        if !report.changed.is_empty() {
            tracing::debug!(id = %event.id, changed = ?report.changed, "Overlay state updated");
        }
        report
    }
}

enum Outcome {
    Applied,
    NotNumeric,
    UnknownOp,
}

fn apply_rule(rule: &RuleDefinition, operand: Option<String>, state: &mut OverlayState) -> Outcome {
    match &rule.op {
        RuleOp::Set => {
            state.set(rule.tag.clone(), operand.unwrap_or_default());
            Outcome::Applied
        }
        RuleOp::Do => {
            state.set(rule.tag.clone(), operand.unwrap_or_else(|| "1".to_string()));
            Outcome::Applied
        }
        RuleOp::Inc => {
            let amount = match operand.as_deref() {
                None => 1.0,
                Some(text) => match parse_number(text) {
                    Some(n) => n,
                    None => return Outcome::NotNumeric,
                },
            };
            let current = state.get(&rule.tag).and_then(parse_number).unwrap_or(0.0);
            state.set(rule.tag.clone(), format_number(current + amount));
            Outcome::Applied
        }
        RuleOp::Max => {
            let Some(candidate) = operand.as_deref().and_then(parse_number) else {
                return Outcome::NotNumeric;
            };
            let replace = match state.get(&rule.tag).and_then(parse_number) {
                Some(current) => candidate > current,
                None => true,
            };
            if replace {
                state.set(rule.tag.clone(), format_number(candidate));
            }
            Outcome::Applied
        }
        RuleOp::Unknown(_) => Outcome::UnknownOp,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::events::EventType;
    use crate::rules::{RuleConfig, RuleValue};

    fn engine(rules: Vec<RuleDefinition>) -> RuleEngine {
        let mut set = RuleSet::new();
        set.add_config(RuleConfig { rules });
        RuleEngine::new(set)
    }

    fn cheer(bits: i64) -> NormalizedEvent {
        let mut event = NormalizedEvent::new(format!("c-{bits}"), EventType::Cheer, 0);
        event.actor_name = Some("Viewer".to_string());
        event.raw = json!({"event": {"bits": bits, "user_name": "viewer"}});
        event
    }

    #[test]
    fn test_inc_twice_doubles() {
        let engine = engine(vec![RuleDefinition::new(
            "cheer",
            "bits_total",
            RuleOp::Inc,
            Some(RuleValue::Text("event.bits".into())),
        )]);
        let mut state = OverlayState::new();

        engine.apply_event(&cheer(150), &mut state);
        assert_eq!(state.get("bits_total"), Some("150"));
        engine.apply_event(&cheer(150), &mut state);
        assert_eq!(state.get("bits_total"), Some("300"));
    }

    #[test]
    fn test_inc_defaults_to_one_from_missing() {
        let engine = engine(vec![RuleDefinition::new("follow", "followers", RuleOp::Inc, None)]);
        let mut state = OverlayState::new();
        let follow = NormalizedEvent::new("f", EventType::Follow, 0);
        let report = engine.apply_event(&follow, &mut state);
        assert_eq!(state.get("followers"), Some("1"));
        assert_eq!(report.changed, vec!["followers".to_string()]);
    }

    #[test]
    fn test_set_from_event_and_literal() {
        let engine = engine(vec![
            RuleDefinition::new("cheer", "latest", RuleOp::Set, Some(RuleValue::Text("event.actor_name".into()))),
            RuleDefinition::new("cheer", "raw_name", RuleOp::Set, Some(RuleValue::Text("event.user_name".into()))),
            RuleDefinition::new("cheer", "missing", RuleOp::Set, Some(RuleValue::Text("event.a.b.c".into()))),
            RuleDefinition::new("cheer", "mode", RuleOp::Set, Some(RuleValue::Text("party".into()))),
        ]);
        let mut state = OverlayState::new();
        engine.apply_event(&cheer(1), &mut state);
        assert_eq!(state.get("latest"), Some("Viewer"));
        assert_eq!(state.get("raw_name"), Some("viewer"));
        assert_eq!(state.get("missing"), Some(""));
        assert_eq!(state.get("mode"), Some("party"));
    }

    #[test]
    fn test_max_replaces_only_when_greater() {
        let engine = engine(vec![RuleDefinition::new(
            "cheer",
            "top",
            RuleOp::Max,
            Some(RuleValue::Text("event.bits".into())),
        )]);
        let mut state = OverlayState::new();
        state.set("top", "n/a");

        engine.apply_event(&cheer(100), &mut state);
        assert_eq!(state.get("top"), Some("100"), "non-numeric current is replaced");
        engine.apply_event(&cheer(50), &mut state);
        assert_eq!(state.get("top"), Some("100"));
        engine.apply_event(&cheer(500), &mut state);
        assert_eq!(state.get("top"), Some("500"));
    }

    #[test]
    fn test_do_sets_trigger() {
        let engine = engine(vec![
            RuleDefinition::new("raid", "alert", RuleOp::Do, None),
            RuleDefinition::new("raid", "scene", RuleOp::Do, Some(RuleValue::Text("raid".into()))),
        ]);
        let mut state = OverlayState::new();
        engine.apply_event(&NormalizedEvent::new("r", EventType::Raid, 0), &mut state);
        assert_eq!(state.get("alert"), Some("1"));
        assert_eq!(state.get("scene"), Some("raid"));
    }

    #[test]
    fn test_unknown_op_reported_and_rest_applied() {
        let engine = engine(vec![
            RuleDefinition::new("follow", "a", RuleOp::Unknown("explode".into()), None),
            RuleDefinition::new("follow", "b", RuleOp::Inc, None),
            RuleDefinition::new("follow", "c", RuleOp::Inc, Some(RuleValue::Text("lots".into()))),
        ]);
        let mut state = OverlayState::new();
        let report = engine.apply_event(&NormalizedEvent::new("f", EventType::Follow, 0), &mut state);

        assert_eq!(report.unknown_ops, vec!["a: explode".to_string()]);
        assert_eq!(report.skipped, vec!["c".to_string()]);
        assert_eq!(report.applied, 1);
        assert!(!report.is_clean());
        assert_eq!(state.get("a"), None);
        assert_eq!(state.get("b"), Some("1"));
        assert_eq!(state.get("c"), None);
    }

    #[test]
    fn test_disabled_and_other_types_ignored() {
        let mut disabled = RuleDefinition::new("follow", "a", RuleOp::Inc, None);
        disabled.enabled = false;
        let engine = engine(vec![disabled, RuleDefinition::new("raid", "r", RuleOp::Do, None)]);
        let mut state = OverlayState::new();
        let report = engine.apply_event(&NormalizedEvent::new("f", EventType::Follow, 0), &mut state);
        assert_eq!(report, ApplyReport::default());
        assert!(state.is_empty());
    }

    #[test]
    fn test_builtin_gift_rules_use_gift_count() {
        let engine = RuleEngine::new(RuleSet::builtin().unwrap());
        let mut state = OverlayState::new();
        let mut gift = NormalizedEvent::new("g", EventType::SubscriptionGift, 0);
        gift.gift_count = Some(5);
        gift.gifter_name = Some("Santa".into());
        engine.apply_event(&gift, &mut state);
        engine.apply_event(&gift, &mut state);
        assert_eq!(state.get("gifted_total"), Some("10"));
        assert_eq!(state.get("latest_gifter"), Some("Santa"));
    }
}
