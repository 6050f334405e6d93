use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::task::Task;

/// Whole-list snapshots for undo and redo. Entries are value copies; nothing
/// in here aliases the live store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct History {
    undo_stack: Vec<Vec<Task>>,
    redo_stack: Vec<Vec<Task>>,
    #[serde(skip)]
    limit: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the undo stack; `0` keeps everything.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        self.enforce_limit();
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Stores the state from just before a forward mutation.
    pub fn record(&mut self, before: Vec<Task>) {
        self.undo_stack.push(before);
        self.redo_stack.clear();
        self.enforce_limit();
        debug!(undo = self.undo_stack.len(), "history snapshot recorded");
    }

    /// Returns the sequence to restore, parking `current` on the redo stack.
    pub fn undo(&mut self, current: Vec<Task>) -> Option<Vec<Task>> {
        let previous = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Some(previous)
    }

    pub fn redo(&mut self, current: Vec<Task>) -> Option<Vec<Task>> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        self.enforce_limit();
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    fn enforce_limit(&mut self) {
        if self.limit > 0 && self.undo_stack.len() > self.limit {
            let excess = self.undo_stack.len() - self.limit;
            self.undo_stack.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::History;
    use crate::task::{Priority, Task, TaskId};

    fn seq(texts: &[&str]) -> Vec<Task> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| Task::new(TaskId(i as u64 + 1), text.to_string(), None, Priority::Medium))
            .collect()
    }

    #[test]
    fn undo_and_redo_walk_the_stacks() {
        let mut history = History::new();
        assert_eq!(history.undo(seq(&["a"])), None);

        history.record(seq(&[]));
        history.record(seq(&["a"]));
        let current = seq(&["a", "b"]);

        let restored = history.undo(current.clone()).expect("undo");
        assert_eq!(restored, seq(&["a"]));
        assert!(history.can_redo());

        let redone = history.redo(restored).expect("redo");
        assert_eq!(redone, current);
        assert!(!history.can_redo());
        assert_eq!(history.undo_depth(), 2);
    }

    #[test]
    fn forward_mutation_clears_redo() {
        let mut history = History::new();
        history.record(seq(&[]));
        let restored = history.undo(seq(&["a"])).expect("undo");
        assert_eq!(history.redo_depth(), 1);

        history.record(restored);
        assert_eq!(history.redo_depth(), 0);
        assert_eq!(history.redo(seq(&["x"])), None);
    }

    #[test]
    fn limit_drops_oldest_snapshots() {
        let mut history = History::with_limit(2);
        history.record(seq(&[]));
        history.record(seq(&["a"]));
        history.record(seq(&["a", "b"]));
        assert_eq!(history.undo_depth(), 2);

        let current = seq(&["a", "b", "c"]);
        assert_eq!(history.undo(current), Some(seq(&["a", "b"])));
        assert_eq!(history.undo(seq(&["a", "b"])), Some(seq(&["a"])));
        assert_eq!(history.undo(seq(&["a"])), None);
    }
}
