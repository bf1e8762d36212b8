//! Durable, versioned task handles.

use crate::{DriverError, Result, TaskConfig, TaskId, TaskState};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Opaque, versioned reference to a running or previously running task.
///
/// Created by `StartTask`, persisted by the task runner and handed back to
/// `RecoverTask` after a restart. `version` tags the format of
/// `driver_state`; a driver must compare it with its own handle version
/// before decoding the payload and fail closed on mismatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHandle {
    /// Format version of `driver_state`.
    pub version: u32,

    /// Config the task was started with.
    pub config: TaskConfig,

    /// Last known lifecycle state.
    pub state: TaskState,

    /// Driver-private state, only meaningful to a driver build of `version`.
    driver_state: Vec<u8>,
}

impl TaskHandle {
    /// Create a handle for `config` at the given version.
    pub fn new(version: u32, config: TaskConfig) -> Self {
        Self {
            version,
            config,
            state: TaskState::Pending,
            driver_state: Vec::new(),
        }
    }

    /// Task id the handle refers to.
    pub fn task_id(&self) -> &TaskId {
        &self.config.id
    }

    /// Builder method to set the state.
    pub fn with_state(mut self, state: TaskState) -> Self {
        self.state = state;
        self
    }

    /// Encode driver-private state into the handle.
    pub fn set_driver_state<T: Serialize>(&mut self, state: &T) -> Result<()> {
        self.driver_state = serde_json::to_vec(state)?;
        Ok(())
    }

    /// Decode driver-private state.
    ///
    /// Fails with [`DriverError::HandleVersionMismatch`] without looking at
    /// the payload when the handle was written by another format version.
    pub fn driver_state<T: DeserializeOwned>(&self, expected_version: u32) -> Result<T> {
        if self.version != expected_version {
            return Err(DriverError::HandleVersionMismatch {
                expected: expected_version,
                found: self.version,
            });
        }
        if self.driver_state.is_empty() {
            return Err(DriverError::Serialization(
                "handle has no driver state".to_string(),
            ));
        }
        Ok(serde_json::from_slice(&self.driver_state)?)
    }

    /// Raw driver-private bytes.
    pub fn raw_driver_state(&self) -> &[u8] {
        &self.driver_state
    }

    /// Serialize the handle for persistence.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Restore a persisted handle.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
