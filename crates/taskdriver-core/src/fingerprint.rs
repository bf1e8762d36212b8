//! Driver health reports.

use crate::stream::StreamItem;
use crate::DriverError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Health of a driver as reported by its fingerprint stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// The driver could not detect its runtime.
    #[default]
    Undetected,
    /// The runtime was detected but is not usable.
    Unhealthy,
    /// Ready to run tasks.
    Healthy,
}

/// Point-in-time health report.
///
/// Each value replaces the previous one; consumers keep only the latest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Driver attributes such as the detected runtime version.
    pub attributes: HashMap<String, String>,

    /// Health state.
    pub health: HealthState,

    /// Human readable description of the health state.
    pub health_description: String,

    /// Set when the driver hit a fault; no more values follow.
    pub err: Option<DriverError>,
}

impl Fingerprint {
    /// Create a healthy fingerprint.
    pub fn healthy(description: impl Into<String>) -> Self {
        Self {
            health: HealthState::Healthy,
            health_description: description.into(),
            ..Default::default()
        }
    }

    /// Create an unhealthy fingerprint.
    pub fn unhealthy(description: impl Into<String>) -> Self {
        Self {
            health: HealthState::Unhealthy,
            health_description: description.into(),
            ..Default::default()
        }
    }

    /// Builder method to add an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns true if the driver reports itself healthy and error free.
    pub fn is_healthy(&self) -> bool {
        self.health == HealthState::Healthy && self.err.is_none()
    }
}

impl StreamItem for Fingerprint {
    fn from_error(err: DriverError) -> Self {
        Self {
            health: HealthState::Undetected,
            health_description: err.to_string(),
            err: Some(err),
            ..Default::default()
        }
    }

    fn error(&self) -> Option<&DriverError> {
        self.err.as_ref()
    }
}
