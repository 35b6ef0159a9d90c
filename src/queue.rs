//! Priority-ordered holding area for unscheduled tasks.
//!
//! The queue keeps tasks sorted by descending priority. Insertion is stable:
//! a new task with equal priority lands after all existing entries of that
//! priority, preserving FIFO within a priority band. The retry path uses a
//! separate `requeue` insertion that cuts ahead of same-priority submissions
//! so retried work is serviced before fresh work of equal urgency.

use std::collections::VecDeque;

use crate::task::Task;

/// FIFO-within-priority task queue.
///
/// The supervisor pops from the front only; both insertion paths maintain
/// the non-increasing priority invariant.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }

    /// Insert a newly submitted task.
    ///
    /// The task is placed before the first entry with strictly lower
    /// priority, i.e. after every entry of equal or higher priority.
    /// Duplicate ids are not rejected; two submissions coexist as
    /// independent entries.
    pub fn submit(&mut self, task: Task) {
        let pos = self
            .tasks
            .iter()
            .position(|t| t.priority < task.priority)
            .unwrap_or(self.tasks.len());
        self.tasks.insert(pos, task);
    }

    /// Re-insert a task for retry.
    ///
    /// Unlike `submit`, the task is placed ahead of every entry with equal
    /// or lower priority, so a retried task runs before new submissions of
    /// the same priority. Entries with strictly higher priority stay ahead.
    pub fn requeue(&mut self, task: Task) {
        let pos = self
            .tasks
            .iter()
            .position(|t| t.priority <= task.priority)
            .unwrap_or(self.tasks.len());
        self.tasks.insert(pos, task);
    }

    /// Highest-priority task without removing it.
    pub fn peek(&self) -> Option<&Task> {
        self.tasks.front()
    }

    /// Remove and return the highest-priority task.
    pub fn pop_front(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Look up a queued task by id.
    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Remove a queued task by id (used by cancellation).
    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let pos = self.tasks.iter().position(|t| t.id == id)?;
        self.tasks.remove(pos)
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterate queued tasks in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }
}
