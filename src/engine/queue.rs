//! In-memory priority queue of illustration tasks.
//!
//! Plain data structure with no interior locking; the coordinator wraps it
//! in a mutex and is the only concurrent accessor. Entries are kept sorted
//! by priority at insertion time, so dequeue is a scan for the first
//! pending entry.

use std::collections::VecDeque;

use super::types::{IllustrationTask, TaskStatus};

/// Priority-ordered set of illustration work awaiting dispatch.
///
/// Ordering: higher priority first; equal priorities keep arrival order.
/// Only `pending` entries are dequeue-able. Entries whose status was set
/// to anything else before dispatch are skipped, never returned.
#[derive(Debug, Default)]
pub struct TaskQueue {
    entries: VecDeque<IllustrationTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Insert a task behind every entry of equal or higher priority.
    ///
    /// An identifier already present is left where it sits; the queue
    /// never holds two entries for the same task.
    pub fn add(&mut self, task: IllustrationTask) {
        if self.contains(&task.id) {
            return;
        }
        let pos = self
            .entries
            .iter()
            .position(|entry| entry.priority < task.priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, task);
    }

    /// Remove and return the highest-priority pending task.
    ///
    /// Returns `None` when the queue is empty or holds no pending entry.
    /// Non-pending entries stay in place; in-flight work is never
    /// re-dispatched from here.
    pub fn next(&mut self) -> Option<IllustrationTask> {
        let pos = self
            .entries
            .iter()
            .position(|entry| entry.status == TaskStatus::Pending)?;
        self.entries.remove(pos)
    }

    /// Remove a task by identifier wherever it sits. Returns whether an
    /// entry was actually removed.
    pub fn remove(&mut self, task_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != task_id);
        self.entries.len() < before
    }

    /// Remove every entry belonging to the given page. Returns the count.
    pub fn remove_page(&mut self, page_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.page_id != page_id);
        before - self.entries.len()
    }

    /// Remove every entry belonging to the given story. Returns the count.
    pub fn remove_story(&mut self, story_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.story_id != story_id);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.entries.iter().any(|entry| entry.id == task_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identifiers in current dispatch order, for diagnostics.
    pub fn task_ids(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.id.clone()).collect()
    }
}
