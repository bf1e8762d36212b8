//! Function-table driver for tests.
//!
//! Each operation is an optional closure. Operations left unset fail with
//! `Unsupported`, so a test only configures what it exercises.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use taskdriver_core::{
    Capabilities, DriverError, DriverNetwork, ExecTaskResult, ExitResult, Fingerprint, Result,
    TaskConfig, TaskEvent, TaskHandle, TaskId, TaskResourceUsage, TaskStatus,
};

use crate::driver::{DriverPlugin, Receiver};
use crate::info::PluginInfo;

pub type PluginInfoFn = Box<dyn Fn() -> Result<PluginInfo> + Send + Sync>;
pub type CapabilitiesFn = Box<dyn Fn() -> Result<Capabilities> + Send + Sync>;
pub type FingerprintFn =
    Box<dyn Fn(CancellationToken) -> Result<Receiver<Fingerprint>> + Send + Sync>;
pub type RecoverTaskFn = Box<dyn Fn(&TaskHandle) -> Result<()> + Send + Sync>;
pub type StartTaskFn =
    Box<dyn Fn(TaskConfig) -> Result<(TaskHandle, Option<DriverNetwork>)> + Send + Sync>;
pub type WaitTaskFn =
    Box<dyn Fn(CancellationToken, &TaskId) -> Result<Receiver<ExitResult>> + Send + Sync>;
pub type StopTaskFn = Box<dyn Fn(&TaskId, Duration, &str) -> Result<()> + Send + Sync>;
pub type DestroyTaskFn = Box<dyn Fn(&TaskId, bool) -> Result<()> + Send + Sync>;
pub type InspectTaskFn = Box<dyn Fn(&TaskId) -> Result<TaskStatus> + Send + Sync>;
pub type TaskStatsFn = Box<
    dyn Fn(CancellationToken, &TaskId, Duration) -> Result<Receiver<TaskResourceUsage>>
        + Send
        + Sync,
>;
pub type TaskEventsFn = Box<dyn Fn(CancellationToken) -> Result<Receiver<TaskEvent>> + Send + Sync>;
pub type SignalTaskFn = Box<dyn Fn(&TaskId, &str) -> Result<()> + Send + Sync>;
pub type ExecTaskFn =
    Box<dyn Fn(&TaskId, Vec<String>, Duration) -> Result<ExecTaskResult> + Send + Sync>;

/// Driver whose behavior is supplied per operation by the test.
#[derive(Default)]
pub struct MockDriverPlugin {
    pub plugin_info_fn: Option<PluginInfoFn>,
    pub capabilities_fn: Option<CapabilitiesFn>,
    pub fingerprint_fn: Option<FingerprintFn>,
    pub recover_task_fn: Option<RecoverTaskFn>,
    pub start_task_fn: Option<StartTaskFn>,
    pub wait_task_fn: Option<WaitTaskFn>,
    pub stop_task_fn: Option<StopTaskFn>,
    pub destroy_task_fn: Option<DestroyTaskFn>,
    pub inspect_task_fn: Option<InspectTaskFn>,
    pub task_stats_fn: Option<TaskStatsFn>,
    pub task_events_fn: Option<TaskEventsFn>,
    pub signal_task_fn: Option<SignalTaskFn>,
    pub exec_task_fn: Option<ExecTaskFn>,
}

impl MockDriverPlugin {
    /// Name reported by [`MockDriverPlugin::new`].
    pub const NAME: &'static str = "mock_driver";

    /// A mock that passes the handshake and supports signals and exec.
    pub fn new() -> Self {
        Self::default()
            .with_plugin_info(|| Ok(PluginInfo::driver(Self::NAME, "v0.2.1")))
            .with_capabilities(|| {
                Ok(Capabilities {
                    send_signals: true,
                    exec: true,
                    ..Default::default()
                })
            })
    }

    pub fn with_plugin_info(
        mut self,
        f: impl Fn() -> Result<PluginInfo> + Send + Sync + 'static,
    ) -> Self {
        self.plugin_info_fn = Some(Box::new(f));
        self
    }

    pub fn with_capabilities(
        mut self,
        f: impl Fn() -> Result<Capabilities> + Send + Sync + 'static,
    ) -> Self {
        self.capabilities_fn = Some(Box::new(f));
        self
    }

    pub fn with_fingerprint(
        mut self,
        f: impl Fn(CancellationToken) -> Result<Receiver<Fingerprint>> + Send + Sync + 'static,
    ) -> Self {
        self.fingerprint_fn = Some(Box::new(f));
        self
    }

    pub fn with_recover_task(
        mut self,
        f: impl Fn(&TaskHandle) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.recover_task_fn = Some(Box::new(f));
        self
    }

    pub fn with_start_task(
        mut self,
        f: impl Fn(TaskConfig) -> Result<(TaskHandle, Option<DriverNetwork>)>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.start_task_fn = Some(Box::new(f));
        self
    }

    pub fn with_wait_task(
        mut self,
        f: impl Fn(CancellationToken, &TaskId) -> Result<Receiver<ExitResult>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.wait_task_fn = Some(Box::new(f));
        self
    }

    pub fn with_stop_task(
        mut self,
        f: impl Fn(&TaskId, Duration, &str) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.stop_task_fn = Some(Box::new(f));
        self
    }

    pub fn with_destroy_task(
        mut self,
        f: impl Fn(&TaskId, bool) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.destroy_task_fn = Some(Box::new(f));
        self
    }

    pub fn with_inspect_task(
        mut self,
        f: impl Fn(&TaskId) -> Result<TaskStatus> + Send + Sync + 'static,
    ) -> Self {
        self.inspect_task_fn = Some(Box::new(f));
        self
    }

    pub fn with_task_stats(
        mut self,
        f: impl Fn(CancellationToken, &TaskId, Duration) -> Result<Receiver<TaskResourceUsage>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.task_stats_fn = Some(Box::new(f));
        self
    }

    pub fn with_task_events(
        mut self,
        f: impl Fn(CancellationToken) -> Result<Receiver<TaskEvent>> + Send + Sync + 'static,
    ) -> Self {
        self.task_events_fn = Some(Box::new(f));
        self
    }

    pub fn with_signal_task(
        mut self,
        f: impl Fn(&TaskId, &str) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.signal_task_fn = Some(Box::new(f));
        self
    }

    pub fn with_exec_task(
        mut self,
        f: impl Fn(&TaskId, Vec<String>, Duration) -> Result<ExecTaskResult>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.exec_task_fn = Some(Box::new(f));
        self
    }
}

fn unset(op: &str) -> DriverError {
    DriverError::Unsupported(format!("mock driver: {op} not configured"))
}

#[async_trait]
impl DriverPlugin for MockDriverPlugin {
    async fn plugin_info(&self) -> Result<PluginInfo> {
        self.plugin_info_fn.as_ref().ok_or_else(|| unset("plugin_info"))?()
    }

    async fn capabilities(&self) -> Result<Capabilities> {
        self.capabilities_fn.as_ref().ok_or_else(|| unset("capabilities"))?()
    }

    async fn fingerprint(&self, cancel: CancellationToken) -> Result<Receiver<Fingerprint>> {
        self.fingerprint_fn.as_ref().ok_or_else(|| unset("fingerprint"))?(cancel)
    }

    async fn recover_task(&self, handle: &TaskHandle) -> Result<()> {
        self.recover_task_fn.as_ref().ok_or_else(|| unset("recover_task"))?(handle)
    }

    async fn start_task(&self, config: TaskConfig) -> Result<(TaskHandle, Option<DriverNetwork>)> {
        self.start_task_fn.as_ref().ok_or_else(|| unset("start_task"))?(config)
    }

    async fn wait_task(
        &self,
        cancel: CancellationToken,
        task_id: &TaskId,
    ) -> Result<Receiver<ExitResult>> {
        self.wait_task_fn.as_ref().ok_or_else(|| unset("wait_task"))?(cancel, task_id)
    }

    async fn stop_task(&self, task_id: &TaskId, timeout: Duration, signal: &str) -> Result<()> {
        self.stop_task_fn.as_ref().ok_or_else(|| unset("stop_task"))?(task_id, timeout, signal)
    }

    async fn destroy_task(&self, task_id: &TaskId, force: bool) -> Result<()> {
        self.destroy_task_fn.as_ref().ok_or_else(|| unset("destroy_task"))?(task_id, force)
    }

    async fn inspect_task(&self, task_id: &TaskId) -> Result<TaskStatus> {
        self.inspect_task_fn.as_ref().ok_or_else(|| unset("inspect_task"))?(task_id)
    }

    async fn task_stats(
        &self,
        cancel: CancellationToken,
        task_id: &TaskId,
        interval: Duration,
    ) -> Result<Receiver<TaskResourceUsage>> {
        self.task_stats_fn.as_ref().ok_or_else(|| unset("task_stats"))?(cancel, task_id, interval)
    }

    async fn task_events(&self, cancel: CancellationToken) -> Result<Receiver<TaskEvent>> {
        self.task_events_fn.as_ref().ok_or_else(|| unset("task_events"))?(cancel)
    }

    async fn signal_task(&self, task_id: &TaskId, signal: &str) -> Result<()> {
        self.signal_task_fn.as_ref().ok_or_else(|| unset("signal_task"))?(task_id, signal)
    }

    async fn exec_task(
        &self,
        task_id: &TaskId,
        cmd: Vec<String>,
        timeout: Duration,
    ) -> Result<ExecTaskResult> {
        self.exec_task_fn.as_ref().ok_or_else(|| unset("exec_task"))?(task_id, cmd, timeout)
    }
}
