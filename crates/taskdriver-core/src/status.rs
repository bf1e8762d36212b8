//! Task lifecycle state and status snapshots.

use crate::{DriverNetwork, ExitResult, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of a task under a driver.
///
/// `Pending -> Running -> {Exited, Unknown}`. `Unknown` is not necessarily
/// terminal: recovery may bring the task back to `Running`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Accepted but not yet launched.
    #[default]
    Pending,
    /// Launched and supervised.
    Running,
    /// Exited with a known result.
    Exited,
    /// Connectivity to the task was lost without a confirmed exit.
    Unknown,
}

impl TaskState {
    /// Returns true if the task has a confirmed exit.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited)
    }
}

/// Point-in-time snapshot of a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Task identifier.
    pub id: TaskId,

    /// Task name.
    pub name: String,

    /// Current lifecycle state.
    pub state: TaskState,

    /// When the task started.
    pub started_at: Option<DateTime<Utc>>,

    /// When the task exited.
    pub completed_at: Option<DateTime<Utc>>,

    /// Exit result, present once the task is terminal.
    pub exit_result: Option<ExitResult>,

    /// Driver-specific details.
    pub driver_attributes: HashMap<String, String>,

    /// Network binding reported by the driver.
    pub network: Option<DriverNetwork>,
}

impl TaskStatus {
    /// Returns the exit result if the task is terminal.
    pub fn terminal_result(&self) -> Option<&ExitResult> {
        if self.state.is_terminal() {
            self.exit_result.as_ref()
        } else {
            None
        }
    }
}
