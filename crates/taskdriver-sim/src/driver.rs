//! The simulated driver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use taskdriver_core::signal::{signal_number, DEFAULT_KILL_SIGNAL, SIGKILL};
use taskdriver_core::{
    Capabilities, DriverError, DriverNetwork, ExecTaskResult, ExitResult, Fingerprint, Result,
    StreamItem, TaskConfig, TaskEvent, TaskHandle, TaskId, TaskResourceUsage, TaskState,
    TaskStatus,
};
use taskdriver_plugin::{DriverPlugin, PluginInfo, Receiver};

use crate::config::{SimDriverConfig, SimTaskConfig};
use crate::exec::run_command;
use crate::task::{exited, sleep_until, HandleState, SimTask};
use crate::{DRIVER_NAME, HANDLE_VERSION, PLUGIN_VERSION};

/// Address reported for tasks when the driver must set up networking and
/// the task did not ask for one.
const DEFAULT_TASK_IP: &str = "127.0.0.1";

/// Shortest stats sampling interval honored.
const MIN_STATS_INTERVAL: Duration = Duration::from_millis(10);

const EVENT_BUFFER: usize = 64;

/// In-memory driver that simulates workloads.
///
/// Each instance owns its task table; tasks started by one instance are
/// invisible to another until recovered there from a handle.
pub struct SimDriver {
    config: SimDriverConfig,
    capabilities: Capabilities,
    tasks: RwLock<HashMap<TaskId, Arc<SimTask>>>,
    events: broadcast::Sender<TaskEvent>,
    next_pid: AtomicU32,
}

impl SimDriver {
    /// Create a driver instance.
    pub fn new(config: SimDriverConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            capabilities: config.capabilities(),
            config,
            tasks: RwLock::new(HashMap::new()),
            events,
            next_pid: AtomicU32::new(1000),
        }
    }

    /// Create a driver instance from a registry config value.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        Ok(Self::new(SimDriverConfig::from_value(value)?))
    }

    pub fn config(&self) -> &SimDriverConfig {
        &self.config
    }

    /// Number of tracked tasks, exited or not.
    pub async fn task_count(&self) -> usize {
        self.tasks.read().await.len()
    }

    async fn get(&self, task_id: &TaskId) -> Result<Arc<SimTask>> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| DriverError::TaskNotFound(task_id.clone()))
    }

    fn fingerprint_now(&self) -> Fingerprint {
        Fingerprint::healthy("healthy")
            .with_attribute("driver.sim", "1")
            .with_attribute("driver.sim.version", PLUGIN_VERSION)
    }
}

impl Drop for SimDriver {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().values() {
            task.kill_now();
        }
    }
}

/// Send `item` unless the stream was cancelled. Returns false when the
/// producer should stop.
async fn deliver<T>(tx: &mpsc::Sender<T>, cancel: &CancellationToken, item: T) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

#[async_trait]
impl DriverPlugin for SimDriver {
    async fn plugin_info(&self) -> Result<PluginInfo> {
        Ok(PluginInfo::driver(DRIVER_NAME, PLUGIN_VERSION))
    }

    async fn capabilities(&self) -> Result<Capabilities> {
        Ok(self.capabilities.clone())
    }

    async fn fingerprint(&self, cancel: CancellationToken) -> Result<Receiver<Fingerprint>> {
        let (tx, rx) = mpsc::channel(1);
        let healthy = self.fingerprint_now();
        let period = self.config.fingerprint_period();
        let fault_at = self
            .config
            .fault_after_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    _ = sleep_until(fault_at) => {
                        warn!(driver = DRIVER_NAME, "Simulated driver fault");
                        let mut fault = Fingerprint::unhealthy("driver fault");
                        fault.err = Some(DriverError::driver("simulated driver fault"));
                        deliver(&tx, &cancel, fault).await;
                        return;
                    }
                    _ = ticker.tick() => {
                        if !deliver(&tx, &cancel, healthy.clone()).await {
                            return;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn recover_task(&self, handle: &TaskHandle) -> Result<()> {
        let state: HandleState = handle.driver_state(HANDLE_VERSION)?;
        let task_id = handle.task_id();

        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(task_id) {
            debug!(task_id = %task_id, "Task already tracked, nothing to recover");
            return Ok(());
        }
        // Later starts must not reuse the recovered pid.
        self.next_pid
            .fetch_max(state.pid.saturating_add(1), Ordering::Relaxed);

        let workload: SimTaskConfig = handle.config.decode_driver_config()?;
        let elapsed = (Utc::now() - state.started_at)
            .to_std()
            .unwrap_or_default();
        let remaining = workload.run_for().map(|d| d.saturating_sub(elapsed));

        let task = SimTask::launch(
            handle.config.clone(),
            workload.clone(),
            &state,
            workload.network(),
            remaining,
            self.events.clone(),
        );
        task.emit("Task recovered", &[("pid", state.pid.to_string())]);
        tasks.insert(task_id.clone(), task);

        info!(task_id = %task_id, pid = state.pid, remaining = ?remaining, "Task recovered");
        Ok(())
    }

    async fn start_task(&self, config: TaskConfig) -> Result<(TaskHandle, Option<DriverNetwork>)> {
        let workload: SimTaskConfig = config.decode_driver_config()?;
        workload.validate()?;
        self.capabilities.validate_config(&config)?;

        if workload.start_block_for_ms > 0 {
            tokio::time::sleep(Duration::from_millis(workload.start_block_for_ms)).await;
        }
        if let Some(msg) = &workload.start_error {
            return Err(if workload.start_error_recoverable {
                DriverError::Transient(msg.clone())
            } else {
                DriverError::driver(msg.clone())
            });
        }

        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&config.id) {
            return Err(DriverError::TaskExists(config.id.clone()));
        }
        if let Some(max) = self.config.max_tasks {
            let live = tasks.values().filter(|t| !t.is_exited()).count();
            if live >= max {
                return Err(DriverError::ResourceExhausted(format!(
                    "sim driver is running {live} of {max} tasks"
                )));
            }
        }

        let state = HandleState {
            started_at: Utc::now(),
            pid: self.next_pid.fetch_add(1, Ordering::Relaxed),
        };
        let network = workload.network().or_else(|| {
            self.capabilities
                .manages_network()
                .then(|| DriverNetwork::new(DEFAULT_TASK_IP))
        });

        let mut handle =
            TaskHandle::new(HANDLE_VERSION, config.clone()).with_state(TaskState::Running);
        handle.set_driver_state(&state)?;

        let task_id = config.id.clone();
        let task = SimTask::launch(
            config,
            workload.clone(),
            &state,
            network.clone(),
            workload.run_for(),
            self.events.clone(),
        );
        task.emit("Task started", &[("pid", state.pid.to_string())]);
        tasks.insert(task_id.clone(), task);

        info!(task_id = %task_id, pid = state.pid, "Task started");
        Ok((handle, network))
    }

    async fn wait_task(
        &self,
        cancel: CancellationToken,
        task_id: &TaskId,
    ) -> Result<Receiver<ExitResult>> {
        let mut exit_rx = self.get(task_id).await?.subscribe_exit();
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = exited(&mut exit_rx) => result,
            };
            // A task dropped without a result leaves the stream to close.
            if let Some(result) = result {
                deliver(&tx, &cancel, result).await;
            }
        });

        Ok(rx)
    }

    async fn stop_task(&self, task_id: &TaskId, timeout: Duration, signal: &str) -> Result<()> {
        let task = self.get(task_id).await?;
        if task.is_exited() {
            debug!(task_id = %task_id, "Task already exited");
            return Ok(());
        }

        let name = if signal.is_empty() {
            DEFAULT_KILL_SIGNAL
        } else {
            signal
        };
        let signal = signal_number(name)?;
        if task.signal(signal).await.is_err() {
            return Ok(());
        }

        if tokio::time::timeout(timeout, task.wait_exit()).await.is_err() {
            warn!(task_id = %task_id, timeout = ?timeout, "Task did not stop in time, killing");
            let _ = task.signal(SIGKILL).await;
            task.wait_exit().await;
        }
        Ok(())
    }

    async fn destroy_task(&self, task_id: &TaskId, force: bool) -> Result<()> {
        let task = self.get(task_id).await?;
        if !task.is_exited() && !force {
            return Err(DriverError::TaskRunning(task_id.clone()));
        }

        task.begin_terminating();
        if !task.is_exited() {
            let _ = task.signal(SIGKILL).await;
            task.wait_exit().await;
        }

        self.tasks.write().await.remove(task_id);
        info!(task_id = %task_id, force, "Task destroyed");
        Ok(())
    }

    async fn inspect_task(&self, task_id: &TaskId) -> Result<TaskStatus> {
        Ok(self.get(task_id).await?.status().await)
    }

    async fn task_stats(
        &self,
        cancel: CancellationToken,
        task_id: &TaskId,
        interval: Duration,
    ) -> Result<Receiver<TaskResourceUsage>> {
        let task = self.get(task_id).await?;
        let interval = interval.max(MIN_STATS_INTERVAL);
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            let mut exit_rx = task.subscribe_exit();
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    _ = exited(&mut exit_rx) => {
                        deliver(&tx, &cancel, task.peak_sample()).await;
                        return;
                    }
                    _ = ticker.tick() => {
                        if !deliver(&tx, &cancel, task.sample()).await {
                            return;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn task_events(&self, cancel: CancellationToken) -> Result<Receiver<TaskEvent>> {
        let mut events = self.events.subscribe();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    event = events.recv() => event,
                };
                match event {
                    Ok(event) => {
                        if !deliver(&tx, &cancel, event).await {
                            return;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event subscriber lagged, closing event stream");
                        let err = DriverError::driver(format!(
                            "event stream lagged, {skipped} events dropped"
                        ));
                        deliver(&tx, &cancel, TaskEvent::from_error(err)).await;
                        return;
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        });

        Ok(rx)
    }

    async fn signal_task(&self, task_id: &TaskId, signal: &str) -> Result<()> {
        let task = self.get(task_id).await?;
        if !self.capabilities.send_signals {
            return Err(DriverError::Unsupported("send_signals".to_string()));
        }
        if task.is_terminating() {
            return Err(DriverError::TaskTerminating(task_id.clone()));
        }
        task.signal(signal_number(signal)?).await
    }

    async fn exec_task(
        &self,
        task_id: &TaskId,
        cmd: Vec<String>,
        timeout: Duration,
    ) -> Result<ExecTaskResult> {
        let task = self.get(task_id).await?;
        if !self.capabilities.exec {
            return Err(DriverError::Unsupported("exec".to_string()));
        }
        if task.is_terminating() {
            return Err(DriverError::TaskTerminating(task_id.clone()));
        }
        if task.is_exited() {
            return Err(DriverError::TaskNotRunning(task_id.clone()));
        }

        debug!(task_id = %task_id, cmd = ?cmd, "Exec in task");
        tokio::select! {
            biased;
            _ = task.terminating() => Err(DriverError::TaskTerminating(task_id.clone())),
            result = tokio::time::timeout(timeout, run_command(&task, &cmd)) => {
                result.map_err(|_| {
                    warn!(task_id = %task_id, timeout = ?timeout, "Exec timed out, command killed");
                    DriverError::Timeout(timeout)
                })
            }
        }
    }
}
