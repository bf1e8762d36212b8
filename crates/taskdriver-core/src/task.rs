//! Task descriptor types.

use crate::{DriverError, NetworkIsolationSpec, Result, TaskId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable description of a task to start.
///
/// Built by the task runner before `StartTask` and handed to the driver by
/// value. The driver never mutates it; a copy travels inside the
/// [`TaskHandle`](crate::TaskHandle) so recovery can see it again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Unique task identifier.
    pub id: TaskId,

    /// Task name within its group.
    pub name: String,

    /// Name of the job the task belongs to.
    pub job_name: String,

    /// Allocation the task runs in.
    pub alloc_id: String,

    /// Environment variables.
    pub env: HashMap<String, String>,

    /// User to run the task as; empty for the driver default.
    pub user: String,

    /// Resource requests and limits.
    pub resources: Resources,

    /// Host paths to mount into the task.
    pub mounts: Vec<MountConfig>,

    /// Requested network isolation, if any.
    pub network_isolation: Option<NetworkIsolationSpec>,

    /// Driver-specific configuration, already validated by the schema layer.
    pub driver_config: Vec<u8>,

    /// Path the driver should write task stdout to.
    pub stdout_path: Option<String>,

    /// Path the driver should write task stderr to.
    pub stderr_path: Option<String>,
}

impl TaskConfig {
    /// Create a new TaskConfig with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TaskId::generate(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder method to set a specific ID.
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Builder method to set the job name.
    pub fn with_job(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = job_name.into();
        self
    }

    /// Builder method to add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Builder method to set resources.
    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    /// Builder method to add a mount.
    pub fn with_mount(mut self, mount: MountConfig) -> Self {
        self.mounts.push(mount);
        self
    }

    /// Builder method to request network isolation.
    pub fn with_network_isolation(mut self, spec: NetworkIsolationSpec) -> Self {
        self.network_isolation = Some(spec);
        self
    }

    /// Builder method to encode a driver-specific config as the opaque blob.
    pub fn with_driver_config<T: Serialize>(mut self, config: &T) -> Result<Self> {
        self.driver_config = serde_json::to_vec(config)?;
        Ok(self)
    }

    /// Decode the opaque driver config.
    ///
    /// An empty blob decodes as `T::default()`.
    pub fn decode_driver_config<T: DeserializeOwned + Default>(&self) -> Result<T> {
        if self.driver_config.is_empty() {
            return Ok(T::default());
        }
        serde_json::from_slice(&self.driver_config)
            .map_err(|e| DriverError::invalid_config(format!("driver config: {e}")))
    }

    /// Environment as sorted `KEY=value` pairs.
    pub fn env_list(&self) -> Vec<String> {
        let mut list: Vec<String> = self.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        list.sort();
        list
    }

    /// Validate fields every driver relies on.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(DriverError::invalid_config("task id must not be empty"));
        }
        self.resources.validate()?;
        for mount in &self.mounts {
            if mount.task_path.is_empty() {
                return Err(DriverError::invalid_config("mount task_path must not be empty"));
            }
        }
        Ok(())
    }
}

/// Resource requests and limits for a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    /// Relative CPU shares.
    pub cpu_shares: i64,

    /// Reserved CPU core ids.
    pub cpu_cores: Vec<u16>,

    /// Memory reservation in MB.
    pub memory_mb: i64,

    /// Hard memory limit in MB; 0 means the reservation is the limit.
    pub memory_max_mb: i64,

    /// Disk reservation in MB.
    pub disk_mb: i64,
}

impl Resources {
    /// Create resources with CPU shares and memory in MB.
    pub fn new(cpu_shares: i64, memory_mb: i64) -> Self {
        Self {
            cpu_shares,
            memory_mb,
            ..Default::default()
        }
    }

    /// Effective memory limit in MB.
    pub fn memory_limit_mb(&self) -> i64 {
        if self.memory_max_mb > 0 {
            self.memory_max_mb
        } else {
            self.memory_mb
        }
    }

    /// Validate resource values.
    pub fn validate(&self) -> Result<()> {
        if self.cpu_shares < 0 || self.memory_mb < 0 || self.memory_max_mb < 0 || self.disk_mb < 0
        {
            return Err(DriverError::invalid_config(
                "resource values must not be negative",
            ));
        }
        if self.memory_max_mb > 0 && self.memory_max_mb < self.memory_mb {
            return Err(DriverError::invalid_config(format!(
                "memory_max_mb ({}) must be at least memory_mb ({})",
                self.memory_max_mb, self.memory_mb
            )));
        }
        Ok(())
    }
}

/// A host path mounted into a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    /// Path inside the task.
    pub task_path: String,

    /// Path on the host.
    pub host_path: String,

    /// Mount read-only.
    pub readonly: bool,

    /// Propagation mode ("private", "host-to-task", "bidirectional").
    pub propagation_mode: String,
}
