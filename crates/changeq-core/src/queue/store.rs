//! In-memory holding area for pending tasks.

use std::collections::VecDeque;

use crate::domain::Task;

/// FIFO store of pending tasks.
///
/// Only tasks waiting for a worker live here; executing tasks are counted
/// separately by the worker pool.
#[derive(Debug, Default)]
pub struct QueueStore {
    pending: VecDeque<Task>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    /// Append to the back.
    pub fn push(&mut self, task: Task) {
        self.pending.push_back(task);
    }

    /// Remove and return the front task.
    pub fn shift(&mut self) -> Option<Task> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending task, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }
}
