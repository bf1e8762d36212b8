//! The driver plugin trait.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use taskdriver_core::{
    Capabilities, DriverNetwork, ExecTaskResult, ExitResult, Fingerprint, Result, TaskConfig,
    TaskEvent, TaskHandle, TaskId, TaskResourceUsage, TaskStatus,
};

use crate::info::PluginInfo;

/// Raw stream a driver hands back when a streaming operation opens.
pub type Receiver<T> = mpsc::Receiver<T>;

/// Operations every task driver implements.
///
/// Drivers are selected by name from a [`DriverRegistry`](crate::DriverRegistry)
/// and used through a [`DriverClient`](crate::DriverClient), which enforces
/// the handshake, capability gating and stream-closure handling. Each driver
/// instance owns its own task table keyed by [`TaskId`].
///
/// Streaming operations return as soon as the stream is open; the `Err`
/// return is reserved for failing to open it. Faults after that are sent as
/// the last value on the stream. The supplied token is cancelled when the
/// consumer goes away; the driver must stop producing once it is.
#[async_trait]
pub trait DriverPlugin: Send + Sync {
    /// Plugin identity for the handshake.
    async fn plugin_info(&self) -> Result<PluginInfo>;

    /// Static capabilities. Must return the same answer for the lifetime of
    /// the instance.
    async fn capabilities(&self) -> Result<Capabilities>;

    /// Open the health stream.
    async fn fingerprint(&self, cancel: CancellationToken) -> Result<Receiver<Fingerprint>>;

    /// Re-attach to a task using a persisted handle.
    ///
    /// Must fail with `HandleVersionMismatch` for handle versions it does not
    /// know instead of decoding the opaque state.
    async fn recover_task(&self, handle: &TaskHandle) -> Result<()>;

    /// Launch a task. Returns once the launch is confirmed.
    async fn start_task(&self, config: TaskConfig) -> Result<(TaskHandle, Option<DriverNetwork>)>;

    /// Open a stream that yields the task's exit result.
    async fn wait_task(
        &self,
        cancel: CancellationToken,
        task_id: &TaskId,
    ) -> Result<Receiver<ExitResult>>;

    /// Send `signal`, wait up to `timeout`, then force-kill. A no-op on a task
    /// that already exited.
    async fn stop_task(&self, task_id: &TaskId, timeout: Duration, signal: &str) -> Result<()>;

    /// Release all driver resources for the task. Without `force` a task that
    /// has not exited is left alone and an error is returned.
    async fn destroy_task(&self, task_id: &TaskId, force: bool) -> Result<()>;

    /// Snapshot of the task. Never waits for the task to exit.
    async fn inspect_task(&self, task_id: &TaskId) -> Result<TaskStatus>;

    /// Open a resource usage stream sampled roughly every `interval`.
    async fn task_stats(
        &self,
        cancel: CancellationToken,
        task_id: &TaskId,
        interval: Duration,
    ) -> Result<Receiver<TaskResourceUsage>>;

    /// Open the driver-global event stream.
    async fn task_events(&self, cancel: CancellationToken) -> Result<Receiver<TaskEvent>>;

    /// Deliver a signal to the task.
    async fn signal_task(&self, task_id: &TaskId, signal: &str) -> Result<()>;

    /// Run a command inside the task, capturing its output.
    async fn exec_task(
        &self,
        task_id: &TaskId,
        cmd: Vec<String>,
        timeout: Duration,
    ) -> Result<ExecTaskResult>;
}
