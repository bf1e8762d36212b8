//! Resource usage readings.

use crate::stream::StreamItem;
use crate::DriverError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Names of memory counters a driver may report in [`MemoryStats::measured`].
pub mod memory {
    pub const RSS: &str = "RSS";
    pub const CACHE: &str = "Cache";
    pub const SWAP: &str = "Swap";
    pub const USAGE: &str = "Usage";
    pub const MAX_USAGE: &str = "Max Usage";
    pub const KERNEL_USAGE: &str = "Kernel Usage";
    pub const KERNEL_MAX_USAGE: &str = "Kernel Max Usage";
}

/// Names of CPU counters a driver may report in [`CpuStats::measured`].
pub mod cpu {
    pub const SYSTEM_MODE: &str = "System Mode";
    pub const USER_MODE: &str = "User Mode";
    pub const TOTAL_TICKS: &str = "Total Ticks";
    pub const THROTTLED_PERIODS: &str = "Throttled Periods";
    pub const THROTTLED_TIME: &str = "Throttled Time";
    pub const PERCENT: &str = "Percent";
}

/// Memory counters in bytes.
///
/// Not every counter exists on every platform. A zero value only means "no
/// usage" when the counter is listed in `measured`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub rss: u64,
    pub cache: u64,
    pub swap: u64,
    pub usage: u64,
    pub max_usage: u64,
    pub kernel_usage: u64,
    pub kernel_max_usage: u64,
    /// Counters actually measured for this reading.
    pub measured: Vec<String>,
}

impl MemoryStats {
    /// Returns true if `counter` was measured.
    pub fn is_measured(&self, counter: &str) -> bool {
        self.measured.iter().any(|m| m == counter)
    }

    /// Returns the counter value only when it was measured.
    pub fn measured_value(&self, counter: &str) -> Option<u64> {
        if !self.is_measured(counter) {
            return None;
        }
        match counter {
            memory::RSS => Some(self.rss),
            memory::CACHE => Some(self.cache),
            memory::SWAP => Some(self.swap),
            memory::USAGE => Some(self.usage),
            memory::MAX_USAGE => Some(self.max_usage),
            memory::KERNEL_USAGE => Some(self.kernel_usage),
            memory::KERNEL_MAX_USAGE => Some(self.kernel_max_usage),
            _ => None,
        }
    }
}

/// CPU counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub system_mode: f64,
    pub user_mode: f64,
    pub total_ticks: f64,
    pub throttled_periods: u64,
    /// Throttled time in nanoseconds.
    pub throttled_time: u64,
    pub percent: f64,
    /// Counters actually measured for this reading.
    pub measured: Vec<String>,
}

impl CpuStats {
    /// Returns true if `counter` was measured.
    pub fn is_measured(&self, counter: &str) -> bool {
        self.measured.iter().any(|m| m == counter)
    }
}

/// Memory and CPU usage of one process or of a whole task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub memory_stats: MemoryStats,
    pub cpu_stats: CpuStats,
}

/// Resource usage reading for a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResourceUsage {
    /// Aggregate usage of the task.
    pub resource_usage: ResourceUsage,

    /// Unix timestamp in nanoseconds when the reading was taken.
    pub timestamp: i64,

    /// Per-process usage keyed by process id.
    pub pids: HashMap<String, ResourceUsage>,

    /// Set when the stats stream failed; no more readings follow.
    pub err: Option<DriverError>,
}

impl TaskResourceUsage {
    /// Create a reading stamped with the current time.
    pub fn new(resource_usage: ResourceUsage) -> Self {
        Self {
            resource_usage,
            timestamp: chrono::Utc::now()
                .timestamp_nanos_opt()
                .unwrap_or_default(),
            pids: HashMap::new(),
            err: None,
        }
    }

    /// Builder method to add a per-process reading.
    pub fn with_pid(mut self, pid: impl Into<String>, usage: ResourceUsage) -> Self {
        self.pids.insert(pid.into(), usage);
        self
    }
}

impl StreamItem for TaskResourceUsage {
    fn from_error(err: DriverError) -> Self {
        Self {
            err: Some(err),
            ..Default::default()
        }
    }

    fn error(&self) -> Option<&DriverError> {
        self.err.as_ref()
    }
}
