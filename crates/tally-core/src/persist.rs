use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::history::History;
use crate::task::Task;
use crate::theme::Theme;

pub const TASKS_KEY: &str = "tasks";
pub const THEME_KEY: &str = "theme";
pub const HISTORY_KEY: &str = "history";

/// A durable string slot per key. Writes replace the whole value.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Keeps each key in `<dir>/<key>.json`, replaced atomically on write.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        info!(data_dir = %data_dir.display(), "opened file store");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(file = %path.display(), "key not present");
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, value), fields(bytes = value.len()))]
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        debug!(file = %path.display(), "writing key atomically");

        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SavedState {
    pub tasks: Vec<Task>,
    pub theme: Theme,
    pub history: Option<History>,
}

/// Reads everything once at startup. Missing or unreadable values fall back
/// to an empty list and the light theme.
#[instrument(skip(kv))]
pub fn load_state(kv: &dyn KeyValueStore) -> SavedState {
    let tasks = match read_json::<Vec<Task>>(kv, TASKS_KEY) {
        Ok(tasks) => tasks.unwrap_or_default(),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "ignoring unreadable task list");
            Vec::new()
        }
    };

    let theme = match kv.get(THEME_KEY) {
        Ok(Some(raw)) => raw
            .trim()
            .trim_matches('"')
            .parse::<Theme>()
            .unwrap_or_else(|err| {
                warn!(error = %err, "ignoring unknown stored theme");
                Theme::default()
            }),
        Ok(None) => Theme::default(),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "failed to read theme");
            Theme::default()
        }
    };

    let history = match read_json::<History>(kv, HISTORY_KEY) {
        Ok(history) => history,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "ignoring unreadable history");
            None
        }
    };

    debug!(count = tasks.len(), %theme, "loaded saved state");
    SavedState {
        tasks,
        theme,
        history,
    }
}

/// Overwrites both the task list and the theme.
#[instrument(skip(kv, tasks), fields(count = tasks.len()))]
pub fn save_state(kv: &mut dyn KeyValueStore, tasks: &[Task], theme: Theme) -> anyhow::Result<()> {
    let json = serde_json::to_string(tasks).context("failed to encode tasks")?;
    kv.set(TASKS_KEY, &json)
        .context("failed to save tasks")?;
    kv.set(THEME_KEY, theme.storage_value())
        .context("failed to save theme")?;
    Ok(())
}

#[instrument(skip(kv, history))]
pub fn save_history(kv: &mut dyn KeyValueStore, history: &History) -> anyhow::Result<()> {
    let json = serde_json::to_string(history).context("failed to encode history")?;
    kv.set(HISTORY_KEY, &json)
        .context("failed to save history")
}

fn read_json<T: serde::de::DeserializeOwned>(
    kv: &dyn KeyValueStore,
    key: &str,
) -> anyhow::Result<Option<T>> {
    let Some(raw) = kv.get(key)? else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let value = serde_json::from_str(&raw).with_context(|| format!("failed parsing {key}"))?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::{KeyValueStore, MemoryStore, THEME_KEY, TASKS_KEY, load_state, save_state};
    use crate::task::{Priority, Task, TaskId};
    use crate::theme::Theme;

    #[test]
    fn empty_store_gives_defaults() {
        let kv = MemoryStore::new();
        let state = load_state(&kv);
        assert!(state.tasks.is_empty());
        assert_eq!(state.theme, Theme::Light);
        assert!(state.history.is_none());
    }

    #[test]
    fn saves_both_keys() {
        let mut kv = MemoryStore::new();
        let tasks = vec![Task::new(TaskId(5), "call mom".to_string(), None, Priority::High)];
        save_state(&mut kv, &tasks, Theme::Dark).expect("save");

        assert_eq!(kv.get(THEME_KEY).unwrap().as_deref(), Some("dark"));
        let state = load_state(&kv);
        assert_eq!(state.tasks, tasks);
        assert_eq!(state.theme, Theme::Dark);
    }

    #[test]
    fn corrupt_values_fall_back() {
        let mut kv = MemoryStore::new();
        kv.set(TASKS_KEY, "{not json").unwrap();
        kv.set(THEME_KEY, "sepia").unwrap();
        let state = load_state(&kv);
        assert!(state.tasks.is_empty());
        assert_eq!(state.theme, Theme::Light);
    }

    #[test]
    fn reads_camel_case_record_shape() {
        let mut kv = MemoryStore::new();
        kv.set(
            TASKS_KEY,
            r#"[{"id":1712000000000,"text":"Water plants","dueDate":"2026-04-02","priority":"medium","completed":true}]"#,
        )
        .unwrap();
        kv.set(THEME_KEY, "\"dark\"").unwrap();

        let state = load_state(&kv);
        assert_eq!(state.tasks.len(), 1);
        assert!(state.tasks[0].completed);
        assert!(!state.tasks[0].notified);
        assert_eq!(state.theme, Theme::Dark);
    }
}
