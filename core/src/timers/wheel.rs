//! Deterministic virtual-time timer wheel.
//!
//! Deadlines are epoch millis supplied by the caller. Timers sharing a
//! deadline fire in the order they were scheduled.

use std::collections::BTreeMap;

use hashbrown::HashMap;

/// Handle to a scheduled timer. Never reused within one wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
pub struct TimerWheel<T> {
    next_seq: u64,
    /// (deadline, seq) -> payload
    entries: BTreeMap<(i64, u64), (TimerId, T)>,
    /// Pending timer -> deadline, for cancellation
    index: HashMap<TimerId, i64>,
}

impl<T> Default for TimerWheel<T> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            entries: BTreeMap::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> TimerWheel<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline: i64, payload: T) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = TimerId(seq);
        self.entries.insert((deadline, seq), (id, payload));
        self.index.insert(id, deadline);
        id
    }

    /// Remove a pending timer. Returns its payload if it had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let deadline = self.index.remove(&id)?;
        self.entries
            .remove(&(deadline, id.0))
            .map(|(_, payload)| payload)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn deadline_of(&self, id: TimerId) -> Option<i64> {
        self.index.get(&id).copied()
    }

    pub fn next_deadline(&self) -> Option<i64> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Pop the earliest timer whose deadline is at or before `now`
    pub fn pop_due(&mut self, now: i64) -> Option<(TimerId, i64, T)> {
        let (&(deadline, _), _) = self.entries.first_key_value()?;
        if deadline > now {
            return None;
        }
        let ((deadline, _), (id, payload)) = self.entries.pop_first()?;
        self.index.remove(&id);
        Some((id, deadline, payload))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_in_deadline_then_schedule_order() {
        let mut wheel = TimerWheel::new();
        wheel.schedule(200, "late");
        wheel.schedule(100, "first");
        wheel.schedule(100, "second");

        assert_eq!(wheel.next_deadline(), Some(100));
        assert!(wheel.pop_due(99).is_none());

        let fired: Vec<_> = std::iter::from_fn(|| wheel.pop_due(150))
            .map(|(_, _, p)| p)
            .collect();
        assert_eq!(fired, vec!["first", "second"]);
        assert_eq!(wheel.len(), 1);
    }

    #[test]
    fn test_cancel_removes_pending_timer() {
        let mut wheel = TimerWheel::new();
        let a = wheel.schedule(10, 'a');
        let b = wheel.schedule(20, 'b');

        assert_eq!(wheel.cancel(a), Some('a'));
        assert_eq!(wheel.cancel(a), None, "double cancel is a no-op");
        assert!(!wheel.is_pending(a));
        assert!(wheel.is_pending(b));
        assert_eq!(wheel.deadline_of(b), Some(20));
        assert_eq!(wheel.next_deadline(), Some(20));

        let (id, deadline, payload) = wheel.pop_due(20).unwrap();
        assert_eq!((id, deadline, payload), (b, 20, 'b'));
        assert!(wheel.is_empty());
        assert_eq!(wheel.cancel(b), None, "fired timers cannot be cancelled");
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut wheel = TimerWheel::new();
        let first = wheel.schedule(5, ());
        wheel.clear();
        let second = wheel.schedule(5, ());
        assert_ne!(first, second);
    }
}
