use crate::task::TaskId;

/// Failures of task-store and session commands. A command that returns one of
/// these has not changed any state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("invalid task: {0}")]
    Validation(String),
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("position out of range: {from} <-> {to} (list has {len} tasks)")]
    Range { from: usize, to: usize, len: usize },
}
