use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};

use crate::error::TaskError;
use crate::filter::{self, FilterMode};
use crate::history::History;
use crate::notify::{self, Notifier, Scheduler};
use crate::persist::{self, KeyValueStore};
use crate::store::TaskStore;
use crate::task::{Priority, Task, TaskId};
use crate::theme::Theme;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub timezone: Tz,
    pub history_limit: usize,
    pub persist_history: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            history_limit: 100,
            persist_history: true,
        }
    }
}

/// One running session: the task list, its undo history, the current view
/// and theme, the deadline timers, and where all of it is saved.
pub struct Session {
    store: TaskStore,
    history: History,
    filter: FilterMode,
    theme: Theme,
    scheduler: Scheduler,
    notifier: Box<dyn Notifier>,
    alerts_allowed: bool,
    kv: Box<dyn KeyValueStore>,
    persist_history: bool,
}

impl Session {
    /// Loads saved state and asks the notifier for permission once.
    #[instrument(skip_all)]
    pub fn open(
        kv: Box<dyn KeyValueStore>,
        mut notifier: Box<dyn Notifier>,
        options: SessionOptions,
        now: DateTime<Utc>,
    ) -> Self {
        let saved = persist::load_state(kv.as_ref());
        let mut history = if options.persist_history {
            saved.history.unwrap_or_default()
        } else {
            History::new()
        };
        history.set_limit(options.history_limit);

        let alerts_allowed = notifier.request_permission();
        if !alerts_allowed {
            info!("deadline alerts disabled for this session");
        }

        let mut session = Self {
            store: TaskStore::from_tasks(saved.tasks),
            history,
            filter: FilterMode::default(),
            theme: saved.theme,
            scheduler: Scheduler::new(options.timezone),
            notifier,
            alerts_allowed,
            kv,
            persist_history: options.persist_history,
        };
        session.resync(now);
        info!(
            tasks = session.store.len(),
            theme = %session.theme,
            undo = session.history.undo_depth(),
            "session opened"
        );
        session
    }

    pub fn tasks(&self) -> &[Task] {
        self.store.tasks()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.store.get(id)
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn timezone(&self) -> Tz {
        self.scheduler.timezone()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn alerts_allowed(&self) -> bool {
        self.alerts_allowed
    }

    /// The tasks the current filter shows, in list order.
    pub fn visible(&self) -> Vec<&Task> {
        filter::view(self.store.tasks(), self.filter)
    }

    pub fn set_filter(&mut self, mode: FilterMode) {
        debug!(filter = %mode, "filter changed");
        self.filter = mode;
    }

    #[instrument(skip(self))]
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.save();
    }

    #[instrument(skip(self, text, now))]
    pub fn add(
        &mut self,
        text: &str,
        due_date: Option<NaiveDate>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Result<Task, TaskError> {
        let before = self.store.snapshot();
        let task = self.store.add(text, due_date, priority, now)?.clone();
        self.commit(before, now);
        info!(id = %task.id, "task added");
        Ok(task)
    }

    #[instrument(skip(self, id, text, now), fields(id = %id))]
    pub fn update(
        &mut self,
        id: TaskId,
        text: &str,
        due_date: Option<NaiveDate>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Result<Task, TaskError> {
        let before = self.store.snapshot();
        let task = self.store.update(id, text, due_date, priority)?.clone();
        self.commit(before, now);
        info!("task updated");
        Ok(task)
    }

    #[instrument(skip(self, id, now), fields(id = %id))]
    pub fn remove(&mut self, id: TaskId, now: DateTime<Utc>) -> Result<Task, TaskError> {
        let before = self.store.snapshot();
        let task = self.store.remove(id)?;
        self.commit(before, now);
        info!("task removed");
        Ok(task)
    }

    #[instrument(skip(self, id, now), fields(id = %id))]
    pub fn toggle_completed(&mut self, id: TaskId, now: DateTime<Utc>) -> Result<bool, TaskError> {
        let before = self.store.snapshot();
        let completed = self.store.toggle_completed(id)?;
        self.commit(before, now);
        info!(completed, "task toggled");
        Ok(completed)
    }

    /// Swaps two positions of the full, unfiltered list.
    #[instrument(skip(self, now))]
    pub fn reorder(&mut self, from: usize, to: usize, now: DateTime<Utc>) -> Result<(), TaskError> {
        let before = self.store.snapshot();
        self.store.reorder(from, to)?;
        self.commit(before, now);
        info!("tasks swapped");
        Ok(())
    }

    /// Returns `false` when there was nothing to undo.
    #[instrument(skip(self, now))]
    pub fn undo(&mut self, now: DateTime<Utc>) -> bool {
        let Some(previous) = self.history.undo(self.store.snapshot()) else {
            debug!("nothing to undo");
            return false;
        };
        self.store.replace_all(previous);
        self.after_change(now);
        true
    }

    #[instrument(skip(self, now))]
    pub fn redo(&mut self, now: DateTime<Utc>) -> bool {
        let Some(next) = self.history.redo(self.store.snapshot()) else {
            debug!("nothing to redo");
            return false;
        };
        self.store.replace_all(next);
        self.after_change(now);
        true
    }

    /// Fires every deadline timer due at `now`. Returns the alerted tasks.
    #[instrument(skip(self, now))]
    pub fn fire_due_notifications(&mut self, now: DateTime<Utc>) -> Vec<Task> {
        let mut fired = Vec::new();
        for id in self.scheduler.take_due(now) {
            let Some(mut task) = self.store.get(id).cloned() else {
                continue;
            };
            if task.notified {
                continue;
            }
            notify::deliver(self.notifier.as_mut(), &task);
            if self.store.mark_notified(id).is_ok() {
                task.notified = true;
                fired.push(task);
            }
        }
        if !fired.is_empty() {
            info!(count = fired.len(), "deadline alerts delivered");
            self.save();
        }
        fired
    }

    /// Re-reads tasks and theme from storage, for long-running loops that
    /// share the data directory with other invocations.
    #[instrument(skip(self, now))]
    pub fn reload(&mut self, now: DateTime<Utc>) {
        let saved = persist::load_state(self.kv.as_ref());
        self.store.replace_all(saved.tasks);
        self.theme = saved.theme;
        if self.persist_history
            && let Some(mut history) = saved.history
        {
            history.set_limit(self.history.limit());
            self.history = history;
        }
        self.resync(now);
    }

    fn commit(&mut self, before: Vec<Task>, now: DateTime<Utc>) {
        self.history.record(before);
        self.after_change(now);
    }

    fn after_change(&mut self, now: DateTime<Utc>) {
        self.resync(now);
        self.save();
    }

    fn resync(&mut self, now: DateTime<Utc>) {
        if self.alerts_allowed {
            self.scheduler.sync(self.store.tasks(), now);
        }
    }

    /// Write-through; a failed write keeps the in-memory state.
    fn save(&mut self) {
        if let Err(err) = persist::save_state(self.kv.as_mut(), self.store.tasks(), self.theme) {
            warn!(error = %format!("{err:#}"), "failed to save state");
        }
        if self.persist_history
            && let Err(err) = persist::save_history(self.kv.as_mut(), &self.history)
        {
            warn!(error = %format!("{err:#}"), "failed to save history");
        }
    }
}
