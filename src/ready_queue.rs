//! `spec.md` §4.3: a priority-ordered, per-priority-FIFO ready list.

use std::collections::VecDeque;

use crate::task::{Priority, TaskHandle};

struct Band {
    priority: Priority,
    handles: VecDeque<TaskHandle>,
}

/// Priority-ordered bands, highest priority first; within a band, insertion
/// order (FIFO) is preserved. Satisfies `spec.md` §3 invariant 5.
#[derive(Default)]
pub struct ReadyQueue {
    bands: Vec<Band>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self { bands: Vec::new() }
    }

    /// Inserts at the tail of `priority`'s band, creating the band in
    /// priority order if it does not yet exist.
    pub fn insert(&mut self, handle: TaskHandle, priority: Priority) {
        match self.bands.iter().position(|b| b.priority == priority) {
            Some(i) => self.bands[i].handles.push_back(handle),
            None => {
                let at = self.bands.iter().position(|b| b.priority < priority).unwrap_or(self.bands.len());
                self.bands.insert(
                    at,
                    Band {
                        priority,
                        handles: VecDeque::from([handle]),
                    },
                );
            }
        }
    }

    /// The handle the scheduler should run next: the head of the
    /// highest-priority non-empty band.
    pub fn peek_head(&self) -> Option<TaskHandle> {
        self.bands.iter().find(|b| !b.handles.is_empty()).and_then(|b| b.handles.front().copied())
    }

    /// Removes and returns the head of the highest-priority non-empty band.
    pub fn pop_head(&mut self) -> Option<TaskHandle> {
        for band in &mut self.bands {
            if let Some(h) = band.handles.pop_front() {
                self.drop_empty_bands();
                return Some(h);
            }
        }
        None
    }

    /// Removes `handle` from wherever it sits, used by `setPriority` and
    /// `block`/`suspend`/`delete` to take a task out of the ready set.
    pub fn remove(&mut self, handle: TaskHandle) -> bool {
        for band in &mut self.bands {
            if let Some(pos) = band.handles.iter().position(|h| *h == handle) {
                band.handles.remove(pos);
                self.drop_empty_bands();
                return true;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.bands.iter().map(|b| b.handles.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn drop_empty_bands(&mut self) {
        self.bands.retain(|b| !b.handles.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u64) -> TaskHandle {
        TaskHandle(n)
    }

    #[test]
    fn higher_priority_always_heads_the_queue() {
        let mut q = ReadyQueue::new();
        q.insert(h(1), 3);
        q.insert(h(2), 10);
        q.insert(h(3), 5);
        assert_eq!(q.pop_head(), Some(h(2)));
        assert_eq!(q.pop_head(), Some(h(3)));
        assert_eq!(q.pop_head(), Some(h(1)));
    }

    #[test]
    fn equal_priority_is_fifo() {
        let mut q = ReadyQueue::new();
        q.insert(h(1), 5);
        q.insert(h(2), 5);
        q.insert(h(3), 5);
        assert_eq!(q.pop_head(), Some(h(1)));
        assert_eq!(q.pop_head(), Some(h(2)));
        assert_eq!(q.pop_head(), Some(h(3)));
    }

    #[test]
    fn remove_by_handle_drops_empty_bands() {
        let mut q = ReadyQueue::new();
        q.insert(h(1), 5);
        assert!(q.remove(h(1)));
        assert!(q.is_empty());
        assert!(!q.remove(h(1)));
    }
}
