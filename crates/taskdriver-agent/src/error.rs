//! Agent errors.

use thiserror::Error;

use taskdriver_core::{DriverError, TaskId};

/// Errors that can occur while running tasks.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A driver call failed.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// Reading or writing persisted state failed.
    #[error("state I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted handle could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The task cannot be supervised any more and its handle was dropped.
    #[error("task {task_id} lost: {reason}")]
    TaskLost { task_id: TaskId, reason: String },

    /// A start attempt failed in a way that may have launched the task.
    #[error("start of task {task_id} is ambiguous: {source}")]
    AmbiguousStart {
        task_id: TaskId,
        #[source]
        source: DriverError,
    },

    /// The driver reported itself unhealthy.
    #[error("driver unhealthy: {0}")]
    DriverUnhealthy(String),

    /// No persisted handle for the task.
    #[error("no handle stored for task {0}")]
    NoHandle(TaskId),
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl AgentError {
    /// The underlying driver error, if any.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Driver(err) | Self::AmbiguousStart { source: err, .. } => Some(err),
            _ => None,
        }
    }
}
