//! Task driver plugin contract.
//!
//! This crate contains:
//! - The [`DriverPlugin`] trait every driver implements
//! - The plugin handshake ([`PluginInfo`] and API version negotiation)
//! - [`DriverStream`], which guarantees every stream ends with a definitive value
//! - [`DriverClient`], the task runner's view of a driver
//! - [`DriverRegistry`], drivers keyed by name
//! - A function-table mock driver (feature `mock`)

pub mod client;
pub mod driver;
pub mod info;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod registry;
pub mod stream;

// Re-export commonly used types
pub use client::DriverClient;
pub use driver::{DriverPlugin, Receiver};
pub use info::{PluginInfo, API_VERSION_V010, PLUGIN_TYPE_DRIVER, SUPPORTED_API_VERSIONS};
pub use registry::{DriverFactory, DriverRegistry};
pub use stream::DriverStream;
pub use tokio_util::sync::CancellationToken;
