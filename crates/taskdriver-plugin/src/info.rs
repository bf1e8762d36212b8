//! Plugin identity and API version handshake.

use serde::{Deserialize, Serialize};
use taskdriver_core::{DriverError, Result};

/// Plugin type string reported by task drivers.
pub const PLUGIN_TYPE_DRIVER: &str = "driver";

/// First driver API version.
pub const API_VERSION_V010: &str = "v0.1.0";

/// API versions this build can speak, most preferred first.
pub const SUPPORTED_API_VERSIONS: &[&str] = &[API_VERSION_V010];

/// Identity a plugin reports before any task operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin type; must be [`PLUGIN_TYPE_DRIVER`].
    pub plugin_type: String,

    /// API versions the plugin implements.
    pub api_versions: Vec<String>,

    /// Plugin build version.
    pub plugin_version: String,

    /// Plugin name, also the registry key.
    pub name: String,
}

impl PluginInfo {
    /// Create the info of a driver plugin speaking the current API.
    pub fn driver(name: impl Into<String>, plugin_version: impl Into<String>) -> Self {
        Self {
            plugin_type: PLUGIN_TYPE_DRIVER.to_string(),
            api_versions: vec![API_VERSION_V010.to_string()],
            plugin_version: plugin_version.into(),
            name: name.into(),
        }
    }

    /// Check the plugin type and pick the API version to speak.
    ///
    /// Returns the first entry of `supported` the plugin also implements.
    pub fn negotiate(&self, supported: &[&str]) -> Result<String> {
        if self.plugin_type != PLUGIN_TYPE_DRIVER {
            return Err(DriverError::IncompatiblePlugin(format!(
                "plugin {:?} has unknown type {:?}",
                self.name, self.plugin_type
            )));
        }

        supported
            .iter()
            .find(|v| self.api_versions.iter().any(|a| a == *v))
            .map(|v| v.to_string())
            .ok_or_else(|| {
                DriverError::IncompatiblePlugin(format!(
                    "plugin {:?} implements API versions {:?}, supported are {:?}",
                    self.name, self.api_versions, supported
                ))
            })
    }
}
