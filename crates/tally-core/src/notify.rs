use std::collections::HashMap;
use std::io::{self, Write};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};

use crate::datetime::deadline_of;
use crate::task::{Task, TaskId};

pub const ALERT_WINDOW_MS: i64 = 86_400_000;
pub const ALERT_TITLE: &str = "Task due soon";

/// Sink for deadline alerts.
pub trait Notifier {
    /// Asked once per session; `false` silences every alert.
    fn request_permission(&mut self) -> bool;

    fn notify(&mut self, title: &str, body: &str) -> anyhow::Result<()>;
}

/// Rings the terminal bell and prints the alert on stderr.
#[derive(Debug, Clone)]
pub struct TerminalNotifier {
    enabled: bool,
}

impl TerminalNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Notifier for TerminalNotifier {
    fn request_permission(&mut self) -> bool {
        self.enabled
    }

    fn notify(&mut self, title: &str, body: &str) -> anyhow::Result<()> {
        let mut err = io::stderr().lock();
        writeln!(err, "\x07{title}: {body}")?;
        err.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub id: TaskId,
    pub due_date: NaiveDate,
    pub fire_at: DateTime<Utc>,
}

/// One-shot deadline timers keyed by task id.
#[derive(Debug, Clone)]
pub struct Scheduler {
    tz: Tz,
    timers: HashMap<TaskId, Timer>,
}

impl Scheduler {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            timers: HashMap::new(),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Brings the timer set in line with `tasks`. Safe to call after every
    /// change: a task keeps its timer while its deadline is unchanged, gets
    /// a fresh one when the deadline moves, and loses it once it no longer
    /// qualifies.
    #[instrument(skip(self, tasks, now), fields(tasks = tasks.len()))]
    pub fn sync(&mut self, tasks: &[Task], now: DateTime<Utc>) {
        let window = Duration::milliseconds(ALERT_WINDOW_MS);
        let mut wanted: HashMap<TaskId, NaiveDate> = HashMap::new();

        for task in tasks {
            if task.notified {
                continue;
            }
            let Some(due_date) = task.due_date else {
                continue;
            };
            // A timer that has already come due stays until take_due drains it.
            if let Some(timer) = self.timers.get(&task.id)
                && timer.due_date == due_date
                && timer.fire_at <= now
            {
                wanted.insert(task.id, due_date);
                continue;
            }
            let diff = deadline_of(due_date, self.tz) - now;
            if diff > Duration::zero() && diff <= window {
                wanted.insert(task.id, due_date);
            }
        }

        self.timers.retain(|id, timer| {
            let keep = wanted.get(id) == Some(&timer.due_date);
            if !keep {
                debug!(id = %id, "cancelled deadline timer");
            }
            keep
        });

        for (id, due_date) in wanted {
            if self.timers.contains_key(&id) {
                continue;
            }
            let diff = deadline_of(due_date, self.tz) - now;
            let fire_at = now + diff;
            info!(id = %id, %fire_at, in_ms = diff.num_milliseconds(), "scheduled deadline alert");
            self.timers.insert(id, Timer { id, due_date, fire_at });
        }
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.timers.remove(&id).is_some()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn pending(&self) -> Vec<Timer> {
        let mut timers: Vec<Timer> = self.timers.values().copied().collect();
        timers.sort_by_key(|t| (t.fire_at, t.id));
        timers
    }

    pub fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        self.timers.values().map(|t| t.fire_at).min()
    }

    /// Removes and returns every timer that has come due, earliest first.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<TaskId> {
        let mut due: Vec<Timer> = self
            .timers
            .values()
            .filter(|t| t.fire_at <= now)
            .copied()
            .collect();
        due.sort_by_key(|t| (t.fire_at, t.id));
        for timer in &due {
            self.timers.remove(&timer.id);
        }
        if !due.is_empty() {
            debug!(count = due.len(), "deadline timers fired");
        }
        due.into_iter().map(|t| t.id).collect()
    }
}

/// Delivers one alert, logging rather than failing when the sink errors.
pub(crate) fn deliver(notifier: &mut dyn Notifier, task: &Task) {
    if let Err(err) = notifier.notify(ALERT_TITLE, &task.text) {
        warn!(id = %task.id, error = %err, "failed to deliver deadline alert");
    }
}
