//! Task runner.
//!
//! Owns the caller side of the driver contract: it starts tasks with a
//! bounded retry policy, persists their handles, re-attaches after a
//! restart and supervises each task until a terminal outcome is known.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use taskdriver_core::stats::memory;
use taskdriver_core::{
    DriverNetwork, ErrorKind, ExitResult, TaskConfig, TaskHandle, TaskId, TaskResourceUsage,
    TaskStatus,
};
use taskdriver_plugin::{CancellationToken, DriverClient};

use crate::config::Config;
use crate::error::AgentError;
use crate::health::HealthMonitor;
use crate::store::HandleStore;

/// How long the stats stream may keep running after the task exited, so its
/// final peak reading can still arrive.
const STATS_DRAIN: Duration = Duration::from_millis(500);

/// What became of a supervised task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The task reached a terminal state with a known exit code and signal.
    Exited(ExitResult),

    /// The driver could not determine the outcome. The handle is kept so the
    /// task can be inspected or recovered later.
    Unknown {
        error: String,
        status: Option<TaskStatus>,
    },
}

impl TaskOutcome {
    /// Returns true if the task exited successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(result) if result.successful())
    }
}

/// Summary of one supervised task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub outcome: TaskOutcome,
    /// Highest memory reading seen on the stats stream, in bytes.
    pub peak_memory_bytes: Option<u64>,
}

/// Starts, supervises and recovers tasks through one driver.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    client: DriverClient,
    store: HandleStore,
    config: Config,
    health: Option<Arc<HealthMonitor>>,
}

impl TaskRunner {
    pub fn new(client: DriverClient, store: HandleStore, config: Config) -> Self {
        Self {
            client,
            store,
            config,
            health: None,
        }
    }

    /// Refuse new starts while `monitor` reports the driver unhealthy.
    pub fn with_health(mut self, monitor: Arc<HealthMonitor>) -> Self {
        self.health = Some(monitor);
        self
    }

    pub fn client(&self) -> &DriverClient {
        &self.client
    }

    pub fn store(&self) -> &HandleStore {
        &self.store
    }

    /// Start a task and persist its handle.
    ///
    /// Only confirmed failures are retried. A transport failure or timeout
    /// may have launched the task anyway, so the driver is asked about the
    /// task first and the start is retried only if it does not know it.
    pub async fn start(
        &self,
        config: TaskConfig,
    ) -> Result<(TaskHandle, Option<DriverNetwork>), AgentError> {
        if let Some(health) = &self.health {
            health.check()?;
        }

        let task_id = config.id.clone();
        let mut attempt = 1;
        loop {
            let err = match self.client.start_task(config.clone()).await {
                Ok((handle, network)) => {
                    self.persist(&handle).await?;
                    info!(
                        task_id = %task_id,
                        name = %config.name,
                        attempt,
                        ip = network.as_ref().map(|n| n.ip.as_str()).unwrap_or(""),
                        "Task started"
                    );
                    return Ok((handle, network));
                }
                Err(err) => err,
            };

            match err.kind() {
                ErrorKind::Transient => {}
                ErrorKind::Transport | ErrorKind::Timeout => {
                    match self.client.inspect_task(&task_id).await {
                        Err(inspect_err) if inspect_err.is_not_found() => {}
                        _ => {
                            error!(task_id = %task_id, error = %err, "Start outcome unknown");
                            return Err(AgentError::AmbiguousStart {
                                task_id,
                                source: err,
                            });
                        }
                    }
                }
                _ => return Err(err.into()),
            }

            if attempt >= self.config.start_attempts {
                error!(
                    task_id = %task_id,
                    attempts = attempt,
                    error = %err,
                    "Giving up starting task"
                );
                return Err(err.into());
            }

            let delay = self.config.backoff(attempt);
            warn!(
                task_id = %task_id,
                attempt,
                error = %err,
                "Start failed, retrying in {:?}",
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn persist(&self, handle: &TaskHandle) -> Result<(), AgentError> {
        let Err(err) = self.store.save(handle).await else {
            return Ok(());
        };
        // An unpersisted task could never be recovered.
        error!(
            task_id = %handle.task_id(),
            error = %err,
            "Failed to persist handle, destroying task"
        );
        if let Err(destroy_err) = self.client.destroy_task(handle.task_id(), true).await {
            warn!(task_id = %handle.task_id(), error = %destroy_err, "Failed to destroy task");
        }
        Err(err)
    }

    /// Re-attach to a task from its handle.
    ///
    /// A handle the driver cannot interpret is dropped from the store and
    /// the task is reported lost.
    pub async fn recover(&self, handle: &TaskHandle) -> Result<(), AgentError> {
        let task_id = handle.task_id();
        match self.client.recover_task(handle).await {
            Ok(()) => {
                info!(task_id = %task_id, "Task recovered");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::VersionMismatch => {
                warn!(task_id = %task_id, error = %err, "Dropping handle");
                self.store.remove(task_id).await?;
                Err(AgentError::TaskLost {
                    task_id: task_id.clone(),
                    reason: err.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Recover every stored handle. Returns the ids of recovered tasks.
    ///
    /// Handles that fail for other reasons than a version mismatch stay in
    /// the store for the next attempt.
    pub async fn recover_all(&self) -> Result<Vec<TaskId>, AgentError> {
        let handles = self.store.list().await?;
        let mut recovered = Vec::with_capacity(handles.len());
        for handle in handles {
            match self.recover(&handle).await {
                Ok(()) => recovered.push(handle.task_id().clone()),
                Err(AgentError::TaskLost { task_id, reason }) => {
                    error!(task_id = %task_id, reason = %reason, "Task lost");
                }
                Err(err) => {
                    warn!(task_id = %handle.task_id(), error = %err, "Failed to recover task");
                }
            }
        }
        info!(
            driver = %self.client.name(),
            recovered = recovered.len(),
            "Recovery complete"
        );
        Ok(recovered)
    }

    /// Request a graceful stop of the task.
    pub async fn stop(&self, task_id: &TaskId) -> Result<(), AgentError> {
        self.client
            .stop_task(task_id, self.config.stop_timeout, &self.config.stop_signal)
            .await?;
        Ok(())
    }

    /// Start a task and supervise it to completion.
    pub async fn run(
        &self,
        config: TaskConfig,
        cancel: &CancellationToken,
    ) -> Result<TaskReport, AgentError> {
        let (handle, _) = self.start(config).await?;
        self.supervise(handle.task_id(), cancel).await
    }

    /// Supervise a started or recovered task until its outcome is known.
    ///
    /// Cancelling `cancel` stops the task; supervision then continues until
    /// the driver reports the exit. An exited task is destroyed and its
    /// handle removed. An RPC failure while opening the wait stream is
    /// returned as an error.
    pub async fn supervise(
        &self,
        task_id: &TaskId,
        cancel: &CancellationToken,
    ) -> Result<TaskReport, AgentError> {
        // Independent of `cancel` so a stop does not cut off the exit result.
        let streams = CancellationToken::new();
        let mut wait = self.client.wait_task(&streams, task_id).await?;
        let stats = self.spawn_stats(task_id, &streams);
        let events = self.spawn_events(task_id, &streams);

        let mut stopping = false;
        let exit = loop {
            tokio::select! {
                exit = wait.recv() => break exit,
                _ = cancel.cancelled(), if !stopping => {
                    stopping = true;
                    info!(task_id = %task_id, "Stopping task");
                    if let Err(err) = self.stop(task_id).await {
                        warn!(task_id = %task_id, error = %err, "Failed to stop task");
                    }
                }
            }
        };

        let outcome = match exit {
            Some(result) => match result.err.clone() {
                None => TaskOutcome::Exited(result),
                Some(err) => self.reinspect(task_id, err.to_string()).await,
            },
            None => {
                self.reinspect(task_id, "wait stream ended without a result".to_string())
                    .await
            }
        };

        let peak_memory_bytes = drain(stats, &streams).await.flatten();
        streams.cancel();
        let _ = events.await;

        match &outcome {
            TaskOutcome::Exited(result) => {
                info!(
                    task_id = %task_id,
                    exit_code = result.exit_code,
                    signal = result.signal,
                    oom_killed = result.oom_killed,
                    "Task exited"
                );
                match self.client.destroy_task(task_id, false).await {
                    Ok(()) => {}
                    Err(err) if err.is_not_found() => {}
                    Err(err) => warn!(task_id = %task_id, error = %err, "Failed to destroy task"),
                }
                self.store.remove(task_id).await?;
            }
            TaskOutcome::Unknown { error, status } => {
                warn!(
                    task_id = %task_id,
                    error = %error,
                    state = ?status.as_ref().map(|s| s.state),
                    "Task outcome unknown"
                );
            }
        }

        Ok(TaskReport {
            task_id: task_id.clone(),
            outcome,
            peak_memory_bytes,
        })
    }

    /// The wait stream failed; ask the driver directly.
    async fn reinspect(&self, task_id: &TaskId, error: String) -> TaskOutcome {
        match self.client.inspect_task(task_id).await {
            Ok(status) => match status.terminal_result() {
                Some(result) if result.err.is_none() => TaskOutcome::Exited(result.clone()),
                _ => TaskOutcome::Unknown {
                    error,
                    status: Some(status),
                },
            },
            Err(err) => {
                debug!(task_id = %task_id, error = %err, "Inspect after wait failure failed");
                TaskOutcome::Unknown {
                    error,
                    status: None,
                }
            }
        }
    }

    fn spawn_stats(
        &self,
        task_id: &TaskId,
        streams: &CancellationToken,
    ) -> JoinHandle<Option<u64>> {
        let client = self.client.clone();
        let task_id = task_id.clone();
        let streams = streams.clone();
        let interval = self.config.stats_interval;

        tokio::spawn(async move {
            let mut stream = match client.task_stats(&streams, &task_id, interval).await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(task_id = %task_id, error = %err, "Stats unavailable");
                    return None;
                }
            };

            let mut peak = None;
            while let Some(reading) = stream.recv().await {
                if let Some(err) = &reading.err {
                    if err.is_channel_closed() {
                        debug!(task_id = %task_id, "Stats stream closed");
                    } else {
                        warn!(task_id = %task_id, error = %err, "Stats stream failed");
                    }
                    break;
                }
                if let Some(bytes) = memory_reading(&reading) {
                    peak = peak.max(Some(bytes));
                }
                log_reading(&task_id, &reading);
            }
            peak
        })
    }

    fn spawn_events(&self, task_id: &TaskId, streams: &CancellationToken) -> JoinHandle<()> {
        let client = self.client.clone();
        let task_id = task_id.clone();
        let streams = streams.clone();

        tokio::spawn(async move {
            let mut stream = match client.task_events(&streams).await {
                Ok(stream) => stream,
                Err(err) => {
                    debug!(task_id = %task_id, error = %err, "Events unavailable");
                    return;
                }
            };

            while let Some(event) = stream.recv().await {
                if let Some(err) = &event.err {
                    if !err.is_channel_closed() {
                        warn!(task_id = %task_id, error = %err, "Event stream failed");
                    }
                    break;
                }
                if event.task_id != task_id {
                    continue;
                }
                info!(
                    task_id = %task_id,
                    annotations = ?event.annotations,
                    "{}",
                    event.message
                );
            }
        })
    }
}

/// Wait briefly for the stats task to finish on its own, then cut it off.
async fn drain(
    mut stats: JoinHandle<Option<u64>>,
    streams: &CancellationToken,
) -> Option<Option<u64>> {
    if let Ok(joined) = tokio::time::timeout(STATS_DRAIN, &mut stats).await {
        return joined.ok();
    }
    streams.cancel();
    stats.await.ok()
}

/// Memory figure of a reading, preferring the peak when it was measured.
fn memory_reading(reading: &TaskResourceUsage) -> Option<u64> {
    let mem = &reading.resource_usage.memory_stats;
    mem.measured_value(memory::MAX_USAGE)
        .or_else(|| mem.measured_value(memory::RSS))
        .or_else(|| mem.measured_value(memory::USAGE))
}

fn log_reading(task_id: &TaskId, reading: &TaskResourceUsage) {
    let usage = &reading.resource_usage;
    debug!(
        task_id = %task_id,
        rss = usage.memory_stats.measured_value(memory::RSS),
        max_usage = usage.memory_stats.measured_value(memory::MAX_USAGE),
        cpu_ticks = usage
            .cpu_stats
            .is_measured(taskdriver_core::stats::cpu::TOTAL_TICKS)
            .then_some(usage.cpu_stats.total_ticks),
        pids = reading.pids.len(),
        "Resource usage"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::temp_dir;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use taskdriver_core::{DriverError, TaskState};
    use taskdriver_plugin::mock::MockDriverPlugin;
    use taskdriver_plugin::DriverPlugin;
    use taskdriver_sim::{SimDriver, SimDriverConfig, SimTaskConfig};
    use tokio::sync::mpsc;

    fn test_config() -> Config {
        Config {
            stop_timeout: Duration::from_millis(200),
            stats_interval: Duration::from_millis(10),
            start_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            ..Default::default()
        }
    }

    async fn runner(plugin: Arc<dyn DriverPlugin>) -> TaskRunner {
        let client = DriverClient::connect(plugin).await.unwrap();
        let store = HandleStore::open(temp_dir()).await.unwrap();
        TaskRunner::new(client, store, test_config())
    }

    fn sim_task(name: &str, workload: &SimTaskConfig) -> TaskConfig {
        TaskConfig::new(name).with_driver_config(workload).unwrap()
    }

    fn mock_handle(config: &TaskConfig) -> TaskHandle {
        TaskHandle::new(1, config.clone()).with_state(TaskState::Running)
    }

    #[tokio::test]
    async fn test_run_to_completion() {
        let runner = runner(Arc::new(SimDriver::new(SimDriverConfig::default()))).await;
        let workload = SimTaskConfig {
            run_for_ms: Some(30),
            memory_rss_bytes: 4096,
            ..Default::default()
        };
        let config = sim_task("batch", &workload);
        let task_id = config.id.clone();

        let report = runner.run(config, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.task_id, task_id);
        assert_eq!(report.outcome, TaskOutcome::Exited(ExitResult::new(0, 0)));
        assert!(report.outcome.is_success());
        assert_eq!(report.peak_memory_bytes, Some(4096));

        assert!(runner.store().list().await.unwrap().is_empty());
        let err = runner.client().inspect_task(&task_id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cancel_stops_task() {
        let runner = runner(Arc::new(SimDriver::new(SimDriverConfig::default()))).await;
        let config = sim_task("service", &SimTaskConfig::default());
        let (handle, _) = runner.start(config).await.unwrap();
        assert_eq!(runner.store().list().await.unwrap().len(), 1);

        let cancel = CancellationToken::new();
        let supervisor = {
            let runner = runner.clone();
            let cancel = cancel.clone();
            let task_id = handle.task_id().clone();
            tokio::spawn(async move { runner.supervise(&task_id, &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let report = supervisor.await.unwrap().unwrap();
        let TaskOutcome::Exited(result) = report.outcome else {
            panic!("expected exit, got {:?}", report.outcome);
        };
        assert_eq!(result.signal, 2);
        assert!(!result.successful());
        assert!(runner.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_driver_error_exit_is_unknown() {
        let runner = runner(Arc::new(SimDriver::new(SimDriverConfig::default()))).await;
        let workload = SimTaskConfig {
            run_for_ms: Some(10),
            exit_err_msg: Some("lost track of process".to_string()),
            ..Default::default()
        };
        let config = sim_task("flaky", &workload);
        let task_id = config.id.clone();

        let report = runner.run(config, &CancellationToken::new()).await.unwrap();
        let TaskOutcome::Unknown { error, status } = report.outcome else {
            panic!("expected unknown outcome");
        };
        assert!(error.contains("lost track of process"));
        assert_eq!(status.map(|s| s.state), Some(TaskState::Unknown));

        // Kept for a later inspection or recovery.
        let stored = runner.store().load(&task_id).await.unwrap();
        assert_eq!(stored.task_id(), &task_id);
    }

    #[tokio::test]
    async fn test_wait_stream_crash_is_unknown() {
        let mock = MockDriverPlugin::new()
            .with_start_task(|config| Ok((mock_handle(&config), None)))
            .with_wait_task(|_cancel, _id| {
                let (tx, rx) = mpsc::channel(1);
                drop(tx);
                Ok(rx)
            })
            .with_inspect_task(|id| Err(DriverError::TaskNotFound(id.clone())));
        let runner = runner(Arc::new(mock)).await;

        let report = runner
            .run(TaskConfig::new("web"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            report.outcome,
            TaskOutcome::Unknown {
                error: DriverError::ChannelClosed.to_string(),
                status: None,
            }
        );
        assert_eq!(report.peak_memory_bytes, None);
        assert_eq!(runner.store().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_open_failure_is_error() {
        let mock = MockDriverPlugin::new()
            .with_start_task(|config| Ok((mock_handle(&config), None)))
            .with_wait_task(|_cancel, _id| Err(DriverError::Transport("connection reset".into())));
        let runner = runner(Arc::new(mock)).await;

        let err = runner
            .run(TaskConfig::new("web"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Driver(DriverError::Transport(_))));
    }

    #[tokio::test]
    async fn test_start_retries_transient() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mock = MockDriverPlugin::new().with_start_task(move |config| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err(DriverError::Transient("runtime busy".into()));
            }
            Ok((mock_handle(&config), None))
        });
        let runner = runner(Arc::new(mock)).await;

        let (handle, network) = runner.start(TaskConfig::new("web")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(network.is_none());
        assert!(runner.store().load(handle.task_id()).await.is_ok());
    }

    #[tokio::test]
    async fn test_start_gives_up_after_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mock = MockDriverPlugin::new().with_start_task(move |_config| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DriverError::ResourceExhausted("no slots".into()))
        });
        let runner = runner(Arc::new(mock)).await;

        let err = runner.start(TaskConfig::new("web")).await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Driver(DriverError::ResourceExhausted(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(runner.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_config_error_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mock = MockDriverPlugin::new().with_start_task(move |_config| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DriverError::invalid_config("bad image"))
        });
        let runner = runner(Arc::new(mock)).await;

        let err = runner.start(TaskConfig::new("web")).await.unwrap_err();
        assert_eq!(
            err.driver_error().map(DriverError::kind),
            Some(ErrorKind::Config)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_start_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mock = MockDriverPlugin::new()
            .with_start_task(move |_config| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(DriverError::Transport("connection reset".into()))
            })
            .with_inspect_task(|id| {
                Ok(TaskStatus {
                    id: id.clone(),
                    state: TaskState::Running,
                    ..Default::default()
                })
            });
        let runner = runner(Arc::new(mock)).await;

        let err = runner.start(TaskConfig::new("web")).await.unwrap_err();
        assert!(matches!(err, AgentError::AmbiguousStart { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_retried_when_task_unknown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mock = MockDriverPlugin::new()
            .with_start_task(move |config| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(DriverError::Timeout(Duration::from_secs(1)));
                }
                Ok((mock_handle(&config), None))
            })
            .with_inspect_task(|id| Err(DriverError::TaskNotFound(id.clone())));
        let runner = runner(Arc::new(mock)).await;

        runner.start(TaskConfig::new("web")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unhealthy_driver_refuses_start() {
        let config = SimDriverConfig {
            fingerprint_period_ms: 10,
            fault_after_ms: Some(10),
            ..Default::default()
        };
        let client = DriverClient::connect(Arc::new(SimDriver::new(config)))
            .await
            .unwrap();
        let mut monitor = HealthMonitor::spawn(&client, &CancellationToken::new())
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while monitor.current().err.is_none() {
                assert!(monitor.changed().await);
            }
        })
        .await
        .unwrap();

        let store = HandleStore::open(temp_dir()).await.unwrap();
        let runner = TaskRunner::new(client, store, test_config()).with_health(Arc::new(monitor));
        let err = runner
            .start(sim_task("web", &SimTaskConfig::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::DriverUnhealthy(_)));
    }

    #[tokio::test]
    async fn test_recover_after_restart() {
        let dir = temp_dir();
        let workload = SimTaskConfig {
            run_for_ms: Some(100),
            ..Default::default()
        };
        let config = sim_task("batch", &workload);
        let task_id = config.id.clone();

        let first = SimDriver::new(SimDriverConfig::default());
        {
            let client = DriverClient::connect(Arc::new(first)).await.unwrap();
            let store = HandleStore::open(&dir).await.unwrap();
            TaskRunner::new(client, store, test_config())
                .start(config)
                .await
                .unwrap();
        }

        let client = DriverClient::connect(Arc::new(SimDriver::new(SimDriverConfig::default())))
            .await
            .unwrap();
        let store = HandleStore::open(&dir).await.unwrap();
        let runner = TaskRunner::new(client, store, test_config());

        let recovered = runner.recover_all().await.unwrap();
        assert_eq!(recovered, vec![task_id.clone()]);

        let report = runner
            .supervise(&task_id, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.outcome, TaskOutcome::Exited(ExitResult::new(0, 0)));
        assert!(runner.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_version_mismatch_drops_handle() {
        let runner = runner(Arc::new(SimDriver::new(SimDriverConfig::default()))).await;
        let (mut handle, _) = runner
            .start(sim_task("web", &SimTaskConfig::default()))
            .await
            .unwrap();
        handle.version += 1;
        runner.store().save(&handle).await.unwrap();

        let err = runner.recover(&handle).await.unwrap_err();
        assert!(matches!(err, AgentError::TaskLost { .. }));
        assert!(matches!(
            runner.store().load(handle.task_id()).await,
            Err(AgentError::NoHandle(_))
        ));

        assert!(runner.recover_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recover_failure_keeps_handle() {
        let mock = MockDriverPlugin::new()
            .with_recover_task(|_handle| Err(DriverError::Transport("driver restarting".into())));
        let runner = runner(Arc::new(mock)).await;
        let handle = mock_handle(&TaskConfig::new("web"));
        runner.store().save(&handle).await.unwrap();

        assert!(runner.recover_all().await.unwrap().is_empty());
        assert_eq!(runner.store().list().await.unwrap().len(), 1);
    }
}
