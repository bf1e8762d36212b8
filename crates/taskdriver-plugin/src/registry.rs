//! Drivers keyed by name.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use taskdriver_core::{DriverError, Result};

use crate::client::DriverClient;
use crate::driver::DriverPlugin;

/// Builds a driver instance from its driver-level config.
pub type DriverFactory =
    Arc<dyn Fn(&serde_json::Value) -> Result<Arc<dyn DriverPlugin>> + Send + Sync>;

/// Registry of the drivers available on this node.
///
/// Each factory call yields an independent driver instance with its own
/// task table.
#[derive(Default, Clone)]
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver under `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: DriverFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(DriverError::invalid_config(format!(
                "driver {name} is already registered"
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Returns true if a driver is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered driver names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build a new instance of the named driver.
    pub fn instantiate(
        &self,
        name: &str,
        config: &serde_json::Value,
    ) -> Result<Arc<dyn DriverPlugin>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| DriverError::invalid_config(format!("unknown driver {name}")))?;
        factory(config)
    }

    /// Build the named driver and complete the handshake.
    ///
    /// The plugin must report the name it was registered under.
    pub async fn dispense(&self, name: &str, config: &serde_json::Value) -> Result<DriverClient> {
        let plugin = self.instantiate(name, config)?;
        let client = DriverClient::connect(plugin).await?;
        if client.name() != name {
            return Err(DriverError::IncompatiblePlugin(format!(
                "driver registered as {name} reports name {}",
                client.name()
            )));
        }
        info!(driver = %name, "Driver dispensed");
        Ok(client)
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}
