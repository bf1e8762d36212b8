//! Task runner built on the task driver contract.
//!
//! Starts tasks through a [`DriverClient`](taskdriver_plugin::DriverClient),
//! persists their handles, recovers them after a restart and supervises them
//! until the driver reports a terminal outcome.

pub mod config;
pub mod error;
pub mod health;
pub mod runner;
pub mod store;

pub use config::Config;
pub use error::AgentError;
pub use health::HealthMonitor;
pub use runner::{TaskOutcome, TaskReport, TaskRunner};
pub use store::HandleStore;

use taskdriver_plugin::DriverRegistry;

/// Registry with every built-in driver.
pub fn builtin_registry() -> Result<DriverRegistry, AgentError> {
    let mut registry = DriverRegistry::new();
    taskdriver_sim::register(&mut registry)?;
    Ok(registry)
}
