use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, instrument};

use crate::error::TaskError;
use crate::task::{Priority, Task, TaskId};

/// The ordered task list. Order is significant: it is the display order of the
/// `all` view and the index space used by [`TaskStore::reorder`].
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    last_issued: Option<TaskId>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut store = Self::new();
        store.replace_all(tasks);
        store
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Swaps in a whole sequence (history restore, startup load).
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        let max_id = tasks.iter().map(|t| t.id).max();
        self.last_issued = self.last_issued.max(max_id);
        self.tasks = tasks;
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    #[instrument(skip(self, text, priority, now), fields(priority = %priority))]
    pub fn add(
        &mut self,
        text: &str,
        due_date: Option<NaiveDate>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Result<&Task, TaskError> {
        let text = validate_text(text)?;
        let floor = self.last_issued.max(self.tasks.iter().map(|t| t.id).max());
        let id = TaskId::generate(now, floor);
        self.last_issued = Some(id);

        self.tasks.push(Task::new(id, text, due_date, priority));
        debug!(%id, count = self.tasks.len(), "task appended");
        Ok(&self.tasks[self.tasks.len() - 1])
    }

    /// Replaces the editable fields of a task. A changed due date re-arms the
    /// deadline alert.
    #[instrument(skip(self, id, text), fields(id = %id))]
    pub fn update(
        &mut self,
        id: TaskId,
        text: &str,
        due_date: Option<NaiveDate>,
        priority: Priority,
    ) -> Result<&Task, TaskError> {
        let idx = self.position(id).ok_or(TaskError::NotFound(id))?;
        let text = validate_text(text)?;

        let task = &mut self.tasks[idx];
        if task.due_date != due_date {
            task.notified = false;
        }
        task.text = text;
        task.due_date = due_date;
        task.priority = priority;
        Ok(task)
    }

    #[instrument(skip(self, id), fields(id = %id))]
    pub fn remove(&mut self, id: TaskId) -> Result<Task, TaskError> {
        let idx = self.position(id).ok_or(TaskError::NotFound(id))?;
        Ok(self.tasks.remove(idx))
    }

    /// Flips the completed flag and returns its new value.
    #[instrument(skip(self, id), fields(id = %id))]
    pub fn toggle_completed(&mut self, id: TaskId) -> Result<bool, TaskError> {
        let idx = self.position(id).ok_or(TaskError::NotFound(id))?;
        let task = &mut self.tasks[idx];
        task.completed = !task.completed;
        Ok(task.completed)
    }

    /// Exchanges the tasks at two positions of the full sequence. This is a
    /// swap, not a remove-and-insert move.
    #[instrument(skip(self))]
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), TaskError> {
        let len = self.tasks.len();
        if from >= len || to >= len {
            return Err(TaskError::Range { from, to, len });
        }
        self.tasks.swap(from, to);
        Ok(())
    }

    /// Sets the notified flag without touching anything else.
    pub fn mark_notified(&mut self, id: TaskId) -> Result<(), TaskError> {
        let idx = self.position(id).ok_or(TaskError::NotFound(id))?;
        self.tasks[idx].notified = true;
        Ok(())
    }
}

fn validate_text(text: &str) -> Result<String, TaskError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TaskError::Validation(
            "task text cannot be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{NaiveDate, TimeZone, Utc};

    use super::TaskStore;
    use crate::error::TaskError;
    use crate::task::{Priority, TaskId};

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 16, 5, 0, 0).unwrap()
    }

    fn texts(store: &TaskStore) -> Vec<&str> {
        store.tasks().iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn add_trims_and_sets_defaults() {
        let mut store = TaskStore::new();
        let task = store
            .add("  Buy milk ", None, Priority::Low, now())
            .expect("add");
        assert_eq!(task.text, "Buy milk");
        assert_eq!(task.priority, Priority::Low);
        assert!(!task.completed);
        assert!(!task.notified);
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn add_rejects_blank_text() {
        let mut store = TaskStore::new();
        let err = store.add(" \t ", None, Priority::Medium, now()).unwrap_err();
        assert!(matches!(err, TaskError::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn ids_are_unique_within_one_millisecond() {
        let mut store = TaskStore::new();
        for n in 0..20 {
            store
                .add(&format!("task {n}"), None, Priority::Medium, now())
                .expect("add");
        }
        let first = store.tasks()[0].id;
        store.remove(first).expect("remove");
        store.add("again", None, Priority::Medium, now()).expect("add");

        let ids: HashSet<TaskId> = store.tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), store.len());
        assert!(!ids.contains(&first));
    }

    #[test]
    fn update_preserves_identity_and_flags() {
        let mut store = TaskStore::new();
        let id = store.add("draft", None, Priority::Low, now()).unwrap().id;
        store.toggle_completed(id).unwrap();

        let due = NaiveDate::from_ymd_opt(2026, 3, 1);
        let task = store.update(id, "final", due, Priority::High).unwrap();
        assert_eq!(task.id, id);
        assert_eq!(task.text, "final");
        assert_eq!(task.due_date, due);
        assert_eq!(task.priority, Priority::High);
        assert!(task.completed);
    }

    #[test]
    fn update_rearms_alert_only_when_due_date_changes() {
        let mut store = TaskStore::new();
        let due = NaiveDate::from_ymd_opt(2026, 3, 1);
        let id = store.add("pay rent", due, Priority::High, now()).unwrap().id;
        store.mark_notified(id).unwrap();

        store.update(id, "pay rent!", due, Priority::High).unwrap();
        assert!(store.get(id).unwrap().notified);

        let later = NaiveDate::from_ymd_opt(2026, 3, 8);
        store.update(id, "pay rent!", later, Priority::High).unwrap();
        assert!(!store.get(id).unwrap().notified);
    }

    #[test]
    fn update_missing_or_blank_leaves_store_unchanged() {
        let mut store = TaskStore::new();
        let id = store.add("keep", None, Priority::Low, now()).unwrap().id;
        let before = store.snapshot();

        let err = store
            .update(TaskId(1), "other", None, Priority::High)
            .unwrap_err();
        assert_eq!(err, TaskError::NotFound(TaskId(1)));
        assert_eq!(store.tasks(), before.as_slice());

        let err = store.update(id, "   ", None, Priority::High).unwrap_err();
        assert!(matches!(err, TaskError::Validation(_)));
        assert_eq!(store.tasks(), before.as_slice());
    }

    #[test]
    fn remove_keeps_relative_order() {
        let mut store = TaskStore::new();
        for text in ["a", "b", "c", "d"] {
            store.add(text, None, Priority::Medium, now()).unwrap();
        }
        let b = store.tasks()[1].id;
        let removed = store.remove(b).unwrap();
        assert_eq!(removed.text, "b");
        assert_eq!(texts(&store), vec!["a", "c", "d"]);
        assert_eq!(store.remove(b).unwrap_err(), TaskError::NotFound(b));
    }

    #[test]
    fn reorder_swaps_and_is_self_inverse() {
        let mut store = TaskStore::new();
        for text in ["a", "b", "c", "d"] {
            store.add(text, None, Priority::Medium, now()).unwrap();
        }
        store.reorder(0, 2).unwrap();
        assert_eq!(texts(&store), vec!["c", "b", "a", "d"]);
        store.reorder(0, 2).unwrap();
        assert_eq!(texts(&store), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn reorder_out_of_range_is_rejected_whole() {
        let mut store = TaskStore::new();
        store.add("a", None, Priority::Medium, now()).unwrap();
        store.add("b", None, Priority::Medium, now()).unwrap();
        let err = store.reorder(0, 2).unwrap_err();
        assert_eq!(err, TaskError::Range { from: 0, to: 2, len: 2 });
        assert_eq!(texts(&store), vec!["a", "b"]);
    }
}
