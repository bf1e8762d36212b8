//! Simulated task driver.
//!
//! Runs no real workloads. Each task is a timer with a configurable outcome,
//! described by [`SimTaskConfig`] in the task's driver config. It supports
//! every driver operation, which makes it the reference driver for
//! exercising task runners and the driver contract itself.

pub mod config;
pub mod driver;
mod exec;
mod task;

use std::sync::Arc;

use taskdriver_core::Result;
use taskdriver_plugin::{DriverPlugin, DriverRegistry};

pub use config::{SimDriverConfig, SimTaskConfig};
pub use driver::SimDriver;

/// Registry name of the driver.
pub const DRIVER_NAME: &str = "sim";

/// Plugin build version.
pub const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Format version of the driver state stored in task handles.
pub const HANDLE_VERSION: u32 = 1;

/// Register the sim driver under [`DRIVER_NAME`].
pub fn register(registry: &mut DriverRegistry) -> Result<()> {
    registry.register(
        DRIVER_NAME,
        Arc::new(|config: &serde_json::Value| -> Result<Arc<dyn DriverPlugin>> {
            Ok(Arc::new(SimDriver::from_value(config)?))
        }),
    )
}
