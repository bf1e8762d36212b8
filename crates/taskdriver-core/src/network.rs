//! Network types exchanged between drivers and task runners.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Network isolation mode a task may request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetIsolationMode {
    /// Share the host network namespace.
    #[default]
    Host,
    /// Share a namespace with the other tasks of the group.
    Group,
    /// Dedicated namespace for the task.
    Task,
    /// No networking.
    None,
}

/// Network isolation requested for a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIsolationSpec {
    /// Isolation mode.
    pub mode: NetIsolationMode,

    /// Path of an existing namespace to join, if any.
    pub path: String,

    /// Driver-specific labels describing the namespace.
    pub labels: HashMap<String, String>,
}

/// Network binding information for drivers that manage their own networking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverNetwork {
    /// IP address the workload is reachable on.
    pub ip: String,

    /// Port label to port number mapping.
    pub port_map: HashMap<String, u16>,

    /// Whether the driver address should be advertised instead of the host's.
    pub auto_advertise: bool,
}

impl DriverNetwork {
    /// Create a new DriverNetwork bound to an IP.
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port_map: HashMap::new(),
            auto_advertise: false,
        }
    }

    /// Builder method to add a port mapping.
    pub fn with_port(mut self, label: impl Into<String>, port: u16) -> Self {
        self.port_map.insert(label.into(), port);
        self
    }

    /// Returns true if the driver reported any binding.
    pub fn is_set(&self) -> bool {
        !self.ip.is_empty() || !self.port_map.is_empty()
    }
}
