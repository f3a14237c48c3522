//! Play queue and shuffle history.

use std::collections::{HashSet, VecDeque};

/// Tracks the user asked to hear next, played first-in first-out ahead of
/// any shuffle, party or sequential pick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayQueue {
    items: VecDeque<i64>,
}

impl PlayQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Track ids in play order.
    pub fn items(&self) -> Vec<i64> {
        self.items.iter().copied().collect()
    }

    pub fn contains(&self, track_id: i64) -> bool {
        self.items.contains(&track_id)
    }

    /// Add a track to the end of the queue.
    pub fn add(&mut self, track_id: i64) {
        self.items.push_back(track_id);
    }

    /// Add a track to play before everything else queued.
    pub fn add_next(&mut self, track_id: i64) {
        self.items.push_front(track_id);
    }

    /// Remove the first occurrence of a track. Returns whether it was queued.
    pub fn remove(&mut self, track_id: i64) -> bool {
        match self.items.iter().position(|&id| id == track_id) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Take the next track to play.
    pub fn pop_next(&mut self) -> Option<i64> {
        self.items.pop_front()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Move an item from one position to another.
    pub fn reorder(&mut self, from: usize, to: usize) {
        if from < self.items.len() && to < self.items.len() && from != to
            && let Some(id) = self.items.remove(from)
        {
            self.items.insert(to, id);
        }
    }

    /// Move an item up one position. Returns the new index if moved.
    pub fn move_up(&mut self, index: usize) -> Option<usize> {
        if index == 0 || index >= self.items.len() {
            return None;
        }
        self.reorder(index, index - 1);
        Some(index - 1)
    }

    /// Move an item down one position. Returns the new index if moved.
    pub fn move_down(&mut self, index: usize) -> Option<usize> {
        if index + 1 >= self.items.len() {
            return None;
        }
        self.reorder(index, index + 1);
        Some(index + 1)
    }
}

/// Picks "previous" can walk back through.
pub const HISTORY_LIMIT: usize = 500;

/// Tracks picked by shuffle or party mode, so random picks avoid repeats
/// and "previous" can walk back.
///
/// Only the latest [`HISTORY_LIMIT`] picks are kept for walking back;
/// the round's seen set is cleared by [`start_round`](Self::start_round).
#[derive(Debug, Clone, Default)]
pub struct History {
    played: VecDeque<i64>,
    seen: HashSet<i64>,
}

impl History {
    pub fn record(&mut self, track_id: i64) {
        if self.played.len() == HISTORY_LIMIT {
            self.played.pop_front();
        }
        self.played.push_back(track_id);
        self.seen.insert(track_id);
    }

    pub fn has_played(&self, track_id: i64) -> bool {
        self.seen.contains(&track_id)
    }

    /// Step back: forget the latest pick and return the one before it.
    pub fn back(&mut self) -> Option<i64> {
        if self.played.len() < 2 {
            return None;
        }
        if let Some(latest) = self.played.pop_back() {
            self.seen.remove(&latest);
        }
        self.played.back().copied()
    }

    /// Start a new round once every candidate has been heard. The order for
    /// "previous" is kept.
    pub fn start_round(&mut self, keep: Option<i64>) {
        self.seen.clear();
        if let Some(id) = keep {
            self.seen.insert(id);
        }
    }

    pub fn clear(&mut self) {
        self.played.clear();
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.played.len()
    }
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Whatever goes in comes out in the same order
        #[test]
        fn queue_pops_in_fifo_order(ids in proptest::collection::vec(any::<i64>(), 0..50)) {
            let mut queue = PlayQueue::new();
            for id in &ids {
                queue.add(*id);
            }
            let mut popped = Vec::new();
            while let Some(id) = queue.pop_next() {
                popped.push(id);
            }
            prop_assert_eq!(popped, ids);
        }

        /// Reordering never adds or drops tracks
        #[test]
        fn moves_keep_the_same_tracks(
            ids in proptest::collection::vec(0i64..20, 1..20),
            moves in proptest::collection::vec((any::<bool>(), 0usize..25), 0..30),
        ) {
            let mut queue = PlayQueue::new();
            for id in &ids {
                queue.add(*id);
            }
            for (up, index) in moves {
                if up {
                    queue.move_up(index);
                } else {
                    queue.move_down(index);
                }
            }
            let mut before = ids.clone();
            let mut after = queue.items();
            before.sort_unstable();
            after.sort_unstable();
            prop_assert_eq!(before, after);
        }
    }
}
