//! Static driver capabilities.

use crate::{DriverError, NetIsolationMode, Result, TaskConfig};
use serde::{Deserialize, Serialize};

/// Filesystem isolation a driver provides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsIsolation {
    /// Task sees the host filesystem.
    #[default]
    None,
    /// Task runs in a chroot-like root.
    Chroot,
    /// Task runs from its own image.
    Image,
}

/// Whether the driver honors task mounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountConfigSupport {
    /// All mount configs are supported.
    #[default]
    All,
    /// Mounts are rejected.
    None,
}

/// Static facts about what a driver instance supports.
///
/// Queried once per driver instance; the answer must not change for the
/// lifetime of that instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Signals can be delivered to tasks.
    pub send_signals: bool,

    /// Commands can be executed inside tasks.
    pub exec: bool,

    /// Filesystem isolation mode.
    pub fs_isolation: FsIsolation,

    /// Network isolation modes the driver accepts.
    pub net_isolation_modes: Vec<NetIsolationMode>,

    /// The driver creates the task network itself and reports it from `StartTask`.
    pub must_init_network: bool,

    /// Mount support.
    pub mount_configs: MountConfigSupport,

    /// The driver supports dynamically sized workloads.
    pub dynamic_workloads: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            send_signals: false,
            exec: false,
            fs_isolation: FsIsolation::None,
            net_isolation_modes: vec![NetIsolationMode::Host],
            must_init_network: false,
            mount_configs: MountConfigSupport::All,
            dynamic_workloads: false,
        }
    }
}

impl Capabilities {
    /// Returns true if the driver accepts the given isolation mode.
    pub fn has_net_isolation(&self, mode: NetIsolationMode) -> bool {
        self.net_isolation_modes.contains(&mode)
    }

    /// Returns true if the driver manages the task network.
    pub fn manages_network(&self) -> bool {
        self.must_init_network
    }

    /// Reject task configs that request something this driver cannot do.
    pub fn validate_config(&self, config: &TaskConfig) -> Result<()> {
        if !config.mounts.is_empty() && self.mount_configs == MountConfigSupport::None {
            return Err(DriverError::Unsupported(
                "driver does not support mounts".to_string(),
            ));
        }
        if let Some(spec) = &config.network_isolation {
            if !self.has_net_isolation(spec.mode) {
                return Err(DriverError::Unsupported(format!(
                    "network isolation mode {:?}",
                    spec.mode
                )));
            }
        }
        Ok(())
    }
}
