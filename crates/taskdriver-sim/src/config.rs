//! Driver and task configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use taskdriver_core::{
    Capabilities, DriverError, DriverNetwork, FsIsolation, MountConfigSupport, NetIsolationMode,
    Result,
};

/// Driver-level configuration, decoded from the registry's config value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimDriverConfig {
    /// Advertise signal support.
    pub send_signals: bool,

    /// Advertise exec support.
    pub exec: bool,

    /// Advertised filesystem isolation.
    pub fs_isolation: FsIsolation,

    /// Accepted network isolation modes.
    pub net_isolation_modes: Vec<NetIsolationMode>,

    /// Advertise that the driver sets up task networking.
    pub must_init_network: bool,

    /// Mount support.
    pub mount_configs: MountConfigSupport,

    /// Interval between fingerprints.
    pub fingerprint_period_ms: u64,

    /// Report a driver fault on the fingerprint stream after this long.
    pub fault_after_ms: Option<u64>,

    /// Refuse new tasks once this many are tracked.
    pub max_tasks: Option<usize>,
}

impl Default for SimDriverConfig {
    fn default() -> Self {
        Self {
            send_signals: true,
            exec: true,
            fs_isolation: FsIsolation::None,
            net_isolation_modes: vec![NetIsolationMode::Host],
            must_init_network: false,
            mount_configs: MountConfigSupport::All,
            fingerprint_period_ms: 1_000,
            fault_after_ms: None,
            max_tasks: None,
        }
    }
}

impl SimDriverConfig {
    /// Decode from a registry config value. `null` means defaults.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
            .map_err(|e| DriverError::invalid_config(format!("sim driver config: {e}")))
    }

    /// Capabilities advertised for this config.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            send_signals: self.send_signals,
            exec: self.exec,
            fs_isolation: self.fs_isolation,
            net_isolation_modes: self.net_isolation_modes.clone(),
            must_init_network: self.must_init_network,
            mount_configs: self.mount_configs,
            dynamic_workloads: false,
        }
    }

    pub fn fingerprint_period(&self) -> Duration {
        Duration::from_millis(self.fingerprint_period_ms.max(1))
    }
}

/// Per-task workload description carried in `TaskConfig::driver_config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimTaskConfig {
    /// Run this long then exit; run until stopped when absent.
    pub run_for_ms: Option<u64>,

    /// Exit code reported on normal completion.
    pub exit_code: i32,

    /// Signal reported on normal completion.
    pub exit_signal: i32,

    /// Report that the outcome could not be determined.
    pub exit_err_msg: Option<String>,

    /// Fail `StartTask` with this message.
    pub start_error: Option<String>,

    /// Make `start_error` retryable.
    pub start_error_recoverable: bool,

    /// Delay before `StartTask` returns.
    pub start_block_for_ms: u64,

    /// Delay between a terminating signal and the task exiting.
    pub kill_after_ms: u64,

    /// Simulated resident memory.
    pub memory_rss_bytes: u64,

    /// Output of the `stdout` exec command.
    pub stdout_string: String,

    /// Address reported as the task network.
    pub driver_ip: Option<String>,

    /// Port labels reported with `driver_ip`.
    pub port_map: HashMap<String, u16>,
}

impl SimTaskConfig {
    pub fn validate(&self) -> Result<()> {
        if self.exit_signal < 0 {
            return Err(DriverError::invalid_config("exit_signal must not be negative"));
        }
        if self.driver_ip.is_none() && !self.port_map.is_empty() {
            return Err(DriverError::invalid_config("port_map requires driver_ip"));
        }
        Ok(())
    }

    pub fn run_for(&self) -> Option<Duration> {
        self.run_for_ms.map(Duration::from_millis)
    }

    pub fn kill_after(&self) -> Duration {
        Duration::from_millis(self.kill_after_ms)
    }

    /// Network reported from `StartTask`, if any.
    pub fn network(&self) -> Option<DriverNetwork> {
        let ip = self.driver_ip.as_ref()?;
        let mut network = DriverNetwork::new(ip.clone());
        network.port_map = self.port_map.clone();
        Some(network)
    }
}
