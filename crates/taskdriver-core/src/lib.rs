//! Task Driver Core Types
//!
//! This crate contains the data model shared by both sides of the task
//! driver contract, with no dependencies on:
//! - An async runtime
//! - The plugin transport
//! - Any concrete driver
//!
//! Drivers produce these values and task runners consume them.

pub mod capabilities;
pub mod error;
pub mod event;
pub mod exec;
pub mod exit;
pub mod fingerprint;
pub mod handle;
pub mod ids;
pub mod network;
pub mod signal;
pub mod stats;
pub mod status;
pub mod stream;
pub mod task;

// Re-export commonly used types
pub use capabilities::{Capabilities, FsIsolation, MountConfigSupport};
pub use error::{DriverError, ErrorKind, Result};
pub use event::TaskEvent;
pub use exec::ExecTaskResult;
pub use exit::ExitResult;
pub use fingerprint::{Fingerprint, HealthState};
pub use handle::TaskHandle;
pub use ids::TaskId;
pub use network::{DriverNetwork, NetIsolationMode, NetworkIsolationSpec};
pub use stats::{CpuStats, MemoryStats, ResourceUsage, TaskResourceUsage};
pub use status::{TaskState, TaskStatus};
pub use stream::StreamItem;
pub use task::{MountConfig, Resources, TaskConfig};
