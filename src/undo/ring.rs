//! Byte-budgeted linear undo history.

use std::collections::VecDeque;

use super::state::UndoBuffer;

/// Sequence of undo buffers with a cursor.
///
/// Buffers before `location` can be undone, buffers at or after it can be
/// redone. Committing a new buffer drops everything at or after `location`
/// first, so history never branches. When the estimated footprint exceeds
/// `max_bytes`, the oldest buffers are evicted, up to and including the one
/// just committed.
#[derive(Debug)]
pub struct UndoRing {
    buffers: VecDeque<UndoBuffer>,
    location: usize,
    total_bytes: usize,
    max_bytes: usize,
    max_depth: Option<usize>,
}

impl UndoRing {
    pub fn new(max_bytes: usize, max_depth: Option<usize>) -> Self {
        Self {
            buffers: VecDeque::new(),
            location: 0,
            total_bytes: 0,
            max_bytes,
            max_depth,
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn location(&self) -> usize {
        self.location
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn has_undo(&self) -> bool {
        self.location > 0
    }

    pub fn has_redo(&self) -> bool {
        self.location < self.buffers.len()
    }

    /// Pushes `buffer` as the newest edit, discarding any redo history.
    pub fn commit(&mut self, buffer: UndoBuffer) {
        self.truncate();
        self.total_bytes += buffer.memory_size();
        self.buffers.push_back(buffer);
        self.location = self.buffers.len();
        self.evict();
    }

    /// The buffer that [`UndoRing::undo`] would step back over.
    pub fn undo_buffer(&self) -> Option<&UndoBuffer> {
        self.location.checked_sub(1).and_then(|i| self.buffers.get(i))
    }

    /// The buffer that [`UndoRing::redo`] would step forward over.
    pub fn redo_buffer(&self) -> Option<&UndoBuffer> {
        self.buffers.get(self.location)
    }

    /// Moves the cursor back one step. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        if !self.has_undo() {
            return false;
        }
        self.location -= 1;
        true
    }

    /// Moves the cursor forward one step. Returns false when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        if !self.has_redo() {
            return false;
        }
        self.location += 1;
        true
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
        self.location = 0;
        self.total_bytes = 0;
    }

    fn truncate(&mut self) {
        while self.buffers.len() > self.location {
            if let Some(dropped) = self.buffers.pop_back() {
                self.total_bytes -= dropped.memory_size();
            }
        }
    }

    fn evict(&mut self) {
        while self.over_budget() {
            let Some(evicted) = self.buffers.pop_front() else {
                break;
            };
            self.total_bytes -= evicted.memory_size();
            self.location = self.location.saturating_sub(1);
            log::debug!(
                "evicted oldest undo buffer ({} bytes), {} left",
                evicted.memory_size(),
                self.buffers.len()
            );
        }
    }

    fn over_budget(&self) -> bool {
        self.total_bytes > self.max_bytes
            || self.max_depth.is_some_and(|depth| self.buffers.len() > depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::undo::UndoState;
    use proptest::prelude::*;

    fn buffer(journal: u64) -> UndoBuffer {
        let mut before = UndoState::new();
        before.set_journal(journal).unwrap();
        UndoBuffer {
            before,
            after: UndoState::new(),
        }
    }

    fn journal_of(buffer: &UndoBuffer) -> u64 {
        buffer.before.journal().unwrap()
    }

    #[test]
    fn empty_ring_has_nothing() {
        let mut ring = UndoRing::new(1 << 20, None);
        assert!(!ring.has_undo());
        assert!(!ring.has_redo());
        assert!(!ring.undo());
        assert!(!ring.redo());
    }

    #[test]
    fn commit_after_undo_truncates_redo() {
        let mut ring = UndoRing::new(1 << 20, None);
        for i in 0..4 {
            ring.commit(buffer(i));
        }
        assert!(ring.undo());
        assert!(ring.undo());
        assert_eq!(ring.location(), 2);
        assert!(ring.has_redo());

        ring.commit(buffer(9));
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.location(), 3);
        assert!(!ring.has_redo());
        let journals: Vec<_> = ring.buffers.iter().map(journal_of).collect();
        assert_eq!(journals, vec![0, 1, 9]);
        assert_eq!(
            ring.total_bytes(),
            ring.buffers.iter().map(UndoBuffer::memory_size).sum::<usize>()
        );
    }

    #[test]
    fn eviction_is_oldest_first() {
        let per_buffer = buffer(0).memory_size();
        let mut ring = UndoRing::new(per_buffer * 3, None);
        for i in 0..5 {
            ring.commit(buffer(i));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.location(), 3);
        assert_eq!(journal_of(ring.undo_buffer().unwrap()), 4);
        assert_eq!(journal_of(&ring.buffers[0]), 2);
    }

    #[test]
    fn oversized_buffer_evicts_itself() {
        let mut ring = UndoRing::new(1, None);
        ring.commit(buffer(0));
        assert!(ring.is_empty());
        assert_eq!(ring.location(), 0);
        assert_eq!(ring.total_bytes(), 0);
    }

    #[test]
    fn depth_cap() {
        let mut ring = UndoRing::new(usize::MAX, Some(2));
        for i in 0..3 {
            ring.commit(buffer(i));
        }
        assert_eq!(ring.len(), 2);
        assert_eq!(journal_of(&ring.buffers[0]), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Commit,
        Undo,
        Redo,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Commit), Just(Op::Undo), Just(Op::Redo)]
    }

    proptest! {
        #[test]
        fn predicates_hold_under_any_sequence(
            ops in prop::collection::vec(op(), 0..64),
            capacity in 1usize..6,
        ) {
            let per_buffer = buffer(0).memory_size();
            let mut ring = UndoRing::new(per_buffer * capacity, None);
            for (i, op) in ops.into_iter().enumerate() {
                match op {
                    Op::Commit => ring.commit(buffer(i as u64)),
                    Op::Undo => { ring.undo(); }
                    Op::Redo => { ring.redo(); }
                }
                prop_assert!(ring.location() <= ring.len());
                prop_assert_eq!(ring.has_undo(), ring.location() > 0);
                prop_assert_eq!(ring.has_redo(), ring.location() < ring.len());
                prop_assert!(ring.total_bytes() <= per_buffer * capacity);
                prop_assert_eq!(ring.total_bytes(), ring.len() * per_buffer);
            }
        }
    }
}
