use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{
  Deserialize,
  Serialize
};

use crate::task::Task;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
  #[default]
  All,
  Completed,
  Pending
}

impl FilterMode {
  pub fn matches(
    self,
    task: &Task
  ) -> bool {
    match self {
      | FilterMode::All => true,
      | FilterMode::Completed => {
        task.completed
      }
      | FilterMode::Pending => {
        !task.completed
      }
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      | FilterMode::All => "all",
      | FilterMode::Completed => {
        "completed"
      }
      | FilterMode::Pending => "pending"
    }
  }
}

impl fmt::Display for FilterMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for FilterMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(FilterMode::All),
      | "completed" | "done" => {
        Ok(FilterMode::Completed)
      }
      | "pending" | "todo" => {
        Ok(FilterMode::Pending)
      }
      | other => Err(anyhow!(
        "unknown filter: {other} \
         (expected all, completed or \
         pending)"
      ))
    }
  }
}

/// The visible tasks for `mode`, in store
/// order.
pub fn view(
  tasks: &[Task],
  mode: FilterMode
) -> Vec<&Task> {
  tasks
    .iter()
    .filter(|task| mode.matches(task))
    .collect()
}

/// Full-list index of every task `view`
/// would return.
pub fn positions(
  tasks: &[Task],
  mode: FilterMode
) -> Vec<usize> {
  tasks
    .iter()
    .enumerate()
    .filter(|(_, task)| {
      mode.matches(task)
    })
    .map(|(idx, _)| idx)
    .collect()
}
