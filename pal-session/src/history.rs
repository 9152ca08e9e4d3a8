//! Bounded, ordered conversation history.
//!
//! Appends past capacity evict from the front, so the history always holds the
//! most recent turns in their original order. Snapshots are independent
//! copies: a snapshot handed to an in-flight request never observes later
//! appends.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::types::{HistoryEntry, Turn};

/// Maximum number of retained turns.
pub const HISTORY_CAPACITY: usize = 10;

/// Bounded log of conversation turns.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    turns: VecDeque<Turn>,
    capacity: usize,
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHistory {
    /// History with the default capacity of 10 turns.
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// History with a custom capacity, clamped to `1..=HISTORY_CAPACITY`.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, HISTORY_CAPACITY);
        Self {
            turns: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Add a turn at the end, evicting the oldest turns beyond capacity.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
    }

    /// Immutable copy of the current sequence.
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            turns: self.turns.iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }
}

/// Read-only view of the history at a point in time.
///
/// Cheap to clone; clones share the same frozen storage.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    turns: Arc<[Turn]>,
}

impl HistorySnapshot {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// `conversation_history` payload for the answering service.
    pub fn to_wire(&self) -> Vec<HistoryEntry> {
        self.turns.iter().map(Turn::to_entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn numbered(n: usize) -> Turn {
        Turn::user(format!("question {n}"))
    }

    fn contents<'a>(turns: impl Iterator<Item = &'a Turn>) -> Vec<String> {
        turns.map(|t| t.content.clone()).collect()
    }

    #[test]
    fn starts_empty() {
        let history = SessionHistory::new();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 10);
        assert!(history.snapshot().is_empty());
    }

    #[test]
    fn evicts_oldest_first() {
        let mut history = SessionHistory::new();
        for n in 0..12 {
            history.append(numbered(n));
        }

        assert_eq!(history.len(), 10);
        let expected: Vec<String> = (2..12).map(|n| format!("question {n}")).collect();
        assert_eq!(contents(history.iter()), expected);
        assert_eq!(history.last().unwrap().content, "question 11");
    }

    #[test]
    fn snapshot_is_not_affected_by_later_appends() {
        let mut history = SessionHistory::new();
        history.append(numbered(0));
        history.append(numbered(1));

        let snapshot = history.snapshot();
        for n in 2..15 {
            history.append(numbered(n));
        }

        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            contents(snapshot.turns().iter()),
            vec!["question 0", "question 1"]
        );
        assert_eq!(history.len(), 10);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut history = SessionHistory::with_capacity(0);
        history.append(numbered(0));
        history.append(numbered(1));
        assert_eq!(history.len(), 1);
        assert_eq!(history.last().unwrap().content, "question 1");
    }

    #[test]
    fn capacity_never_exceeds_ten() {
        let mut history = SessionHistory::with_capacity(30);
        assert_eq!(history.capacity(), HISTORY_CAPACITY);
        for n in 0..30 {
            history.append(numbered(n));
        }
        assert_eq!(history.len(), 10);
        assert_eq!(history.iter().next().unwrap().content, "question 20");
    }

    #[test]
    fn wire_snapshot_preserves_order() {
        let mut history = SessionHistory::new();
        history.append(Turn::user("first"));
        history.append(Turn::assistant("second", Vec::new(), None, None));

        let wire = history.snapshot().to_wire();
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].content, "first");
        assert_eq!(wire[1].content, "second");
    }

    proptest! {
        #[test]
        fn keeps_last_min_n_capacity(n in 0usize..40, capacity in 1usize..=HISTORY_CAPACITY) {
            let mut history = SessionHistory::with_capacity(capacity);
            for i in 0..n {
                history.append(numbered(i));
            }

            let kept = n.min(capacity);
            prop_assert_eq!(history.len(), kept);
            let expected: Vec<String> = (n - kept..n).map(|i| format!("question {i}")).collect();
            prop_assert_eq!(contents(history.iter()), expected);
        }
    }
}
