//! Driver contract errors.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::TaskId;

/// Result alias used throughout the driver contract.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors returned by driver operations or carried inside stream values.
///
/// The type is `Clone` and serializable because a driver fault observed
/// mid-stream is delivered as the `err` field of the stream's last value
/// rather than as a call-level error.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DriverError {
    /// Operation on a task id the driver does not know.
    #[error("task not found for given id: {0}")]
    TaskNotFound(TaskId),

    /// The stream's channel closed before a terminal value was sent.
    #[error("channel closed")]
    ChannelClosed,

    /// The task configuration is invalid.
    #[error("invalid task config: {0}")]
    InvalidConfig(String),

    /// The driver does not support the requested capability.
    #[error("capability not supported by driver: {0}")]
    Unsupported(String),

    /// The handle was written by a driver build with another state format.
    #[error("handle version mismatch: expected version {expected}, found {found}")]
    HandleVersionMismatch { expected: u32, found: u32 },

    /// A task with this id is already tracked by the driver.
    #[error("task {0} already exists")]
    TaskExists(TaskId),

    /// Destroy without force on a task that has not exited.
    #[error("task {0} is still running")]
    TaskRunning(TaskId),

    /// The task has exited and cannot accept the operation.
    #[error("task {0} is not running")]
    TaskNotRunning(TaskId),

    /// The task is being destroyed.
    #[error("task {0} is being destroyed")]
    TaskTerminating(TaskId),

    /// The node cannot fit the task right now.
    #[error("resources exhausted: {0}")]
    ResourceExhausted(String),

    /// A bounded operation ran past its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Infrastructure failure the caller may retry.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The RPC channel to the plugin failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Plugin failed the type or API version handshake.
    #[error("incompatible plugin: {0}")]
    IncompatiblePlugin(String),

    /// Serialization of handle state or driver config failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal driver fault.
    #[error("driver error: {0}")]
    Driver(String),
}

/// Coarse classification of a [`DriverError`].
///
/// Callers branch on the kind rather than on individual variants when
/// choosing a remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad configuration; do not retry unchanged.
    Config,
    /// Capability missing on this driver.
    Unsupported,
    /// Unknown task id.
    NotFound,
    /// Handle written by an incompatible driver build.
    VersionMismatch,
    /// Task is in a state that rejects the operation.
    Conflict,
    /// Deadline exceeded.
    Timeout,
    /// Retryable infrastructure failure.
    Transient,
    /// RPC-level failure.
    Transport,
    /// Driver-internal fault.
    Internal,
    /// Stream ended without a terminal value.
    ChannelClosed,
}

impl DriverError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TaskNotFound(_) => ErrorKind::NotFound,
            Self::ChannelClosed => ErrorKind::ChannelClosed,
            Self::InvalidConfig(_) | Self::TaskExists(_) | Self::Serialization(_) => {
                ErrorKind::Config
            }
            Self::Unsupported(_) | Self::IncompatiblePlugin(_) => ErrorKind::Unsupported,
            Self::HandleVersionMismatch { .. } => ErrorKind::VersionMismatch,
            Self::TaskRunning(_) | Self::TaskNotRunning(_) | Self::TaskTerminating(_) => {
                ErrorKind::Conflict
            }
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::ResourceExhausted(_) | Self::Transient(_) => ErrorKind::Transient,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Driver(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the caller may retry the same call unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transient | ErrorKind::Transport | ErrorKind::Timeout
        )
    }

    /// Returns true if the task id is unknown to the driver.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Returns true for the synthesized end-of-stream error.
    pub fn is_channel_closed(&self) -> bool {
        matches!(self, Self::ChannelClosed)
    }

    /// Build a configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Build an internal driver error.
    pub fn driver(msg: impl Into<String>) -> Self {
        Self::Driver(msg.into())
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
