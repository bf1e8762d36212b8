//! The task runner's view of a driver.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use taskdriver_core::signal::DEFAULT_KILL_SIGNAL;
use taskdriver_core::{
    Capabilities, DriverError, DriverNetwork, ExecTaskResult, ExitResult, Fingerprint, Result,
    TaskConfig, TaskEvent, TaskHandle, TaskId, TaskResourceUsage, TaskStatus,
};

use crate::driver::DriverPlugin;
use crate::info::{PluginInfo, SUPPORTED_API_VERSIONS};
use crate::stream::DriverStream;

/// A handshaken driver instance.
///
/// Construction performs the plugin handshake and queries capabilities once;
/// a client only exists for a driver that passed both. Capability-gated
/// operations are rejected here without reaching the driver, and every
/// stream is wrapped in a [`DriverStream`].
#[derive(Clone)]
pub struct DriverClient {
    plugin: Arc<dyn DriverPlugin>,
    info: PluginInfo,
    api_version: String,
    capabilities: Capabilities,
}

impl DriverClient {
    /// Handshake with `plugin` and cache its capabilities.
    pub async fn connect(plugin: Arc<dyn DriverPlugin>) -> Result<Self> {
        let info = plugin.plugin_info().await?;
        let api_version = info.negotiate(SUPPORTED_API_VERSIONS)?;

        let capabilities = plugin.capabilities().await.map_err(|e| {
            warn!(driver = %info.name, error = %e, "Driver capabilities query failed");
            e
        })?;

        info!(
            driver = %info.name,
            plugin_version = %info.plugin_version,
            api_version = %api_version,
            send_signals = capabilities.send_signals,
            exec = capabilities.exec,
            "Driver connected"
        );

        Ok(Self {
            plugin,
            info,
            api_version,
            capabilities,
        })
    }

    /// Driver name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Handshake info reported by the driver.
    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    /// Negotiated API version.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Capabilities queried at connect time.
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Open the health stream.
    pub async fn fingerprint(
        &self,
        cancel: &CancellationToken,
    ) -> Result<DriverStream<Fingerprint>> {
        let token = cancel.child_token();
        let rx = self.plugin.fingerprint(token.clone()).await?;
        Ok(DriverStream::forward(rx, token, "fingerprint"))
    }

    /// Re-attach to a task from a persisted handle.
    pub async fn recover_task(&self, handle: &TaskHandle) -> Result<()> {
        debug!(
            driver = %self.info.name,
            task_id = %handle.task_id(),
            version = handle.version,
            "Recovering task"
        );
        self.plugin.recover_task(handle).await
    }

    /// Validate `config` against the driver and start the task.
    ///
    /// The network is only returned when the driver reported one with an
    /// address or ports.
    pub async fn start_task(
        &self,
        config: TaskConfig,
    ) -> Result<(TaskHandle, Option<DriverNetwork>)> {
        config.validate()?;
        self.capabilities.validate_config(&config)?;

        let task_id = config.id.clone();
        let (handle, network) = self.plugin.start_task(config).await?;
        if handle.task_id() != &task_id {
            return Err(DriverError::driver(format!(
                "driver returned handle for task {} when starting {}",
                handle.task_id(),
                task_id
            )));
        }

        debug!(
            driver = %self.info.name,
            task_id = %task_id,
            version = handle.version,
            "Task started"
        );
        Ok((handle, network.filter(DriverNetwork::is_set)))
    }

    /// Open a stream that yields the task's exit result.
    pub async fn wait_task(
        &self,
        cancel: &CancellationToken,
        task_id: &TaskId,
    ) -> Result<DriverStream<ExitResult>> {
        let token = cancel.child_token();
        let rx = self.plugin.wait_task(token.clone(), task_id).await?;
        Ok(DriverStream::forward(rx, token, "wait"))
    }

    /// Stop the task gracefully. An empty `signal` means SIGINT.
    pub async fn stop_task(&self, task_id: &TaskId, timeout: Duration, signal: &str) -> Result<()> {
        let signal = if signal.is_empty() {
            DEFAULT_KILL_SIGNAL
        } else {
            signal
        };
        self.plugin.stop_task(task_id, timeout, signal).await
    }

    /// Release the task's driver resources.
    pub async fn destroy_task(&self, task_id: &TaskId, force: bool) -> Result<()> {
        self.plugin.destroy_task(task_id, force).await
    }

    /// Snapshot of the task.
    pub async fn inspect_task(&self, task_id: &TaskId) -> Result<TaskStatus> {
        self.plugin.inspect_task(task_id).await
    }

    /// Open the per-task resource usage stream.
    pub async fn task_stats(
        &self,
        cancel: &CancellationToken,
        task_id: &TaskId,
        interval: Duration,
    ) -> Result<DriverStream<TaskResourceUsage>> {
        let token = cancel.child_token();
        let rx = self.plugin.task_stats(token.clone(), task_id, interval).await?;
        Ok(DriverStream::forward(rx, token, "stats"))
    }

    /// Open the driver-global event stream.
    pub async fn task_events(&self, cancel: &CancellationToken) -> Result<DriverStream<TaskEvent>> {
        let token = cancel.child_token();
        let rx = self.plugin.task_events(token.clone()).await?;
        Ok(DriverStream::forward(rx, token, "events"))
    }

    /// Deliver a signal. Fails without reaching the driver if it cannot
    /// send signals.
    pub async fn signal_task(&self, task_id: &TaskId, signal: &str) -> Result<()> {
        if !self.capabilities.send_signals {
            return Err(DriverError::Unsupported(format!(
                "driver {} cannot send signals",
                self.info.name
            )));
        }
        self.plugin.signal_task(task_id, signal).await
    }

    /// Run a command inside the task.
    pub async fn exec_task(
        &self,
        task_id: &TaskId,
        cmd: Vec<String>,
        timeout: Duration,
    ) -> Result<ExecTaskResult> {
        if !self.capabilities.exec {
            return Err(DriverError::Unsupported(format!(
                "driver {} does not support exec",
                self.info.name
            )));
        }
        if cmd.is_empty() {
            return Err(DriverError::invalid_config("exec command must not be empty"));
        }
        self.plugin.exec_task(task_id, cmd, timeout).await
    }
}

impl std::fmt::Debug for DriverClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverClient")
            .field("info", &self.info)
            .field("api_version", &self.api_version)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDriverPlugin;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use taskdriver_core::{
        CpuStats, MemoryStats, NetIsolationMode, NetworkIsolationSpec, ResourceUsage, StreamItem,
        TaskState,
    };
    use tokio::sync::mpsc;

    const TASK_ID: &str = "foo";

    fn test_error() -> DriverError {
        DriverError::driver("test error")
    }

    async fn connect(mock: MockDriverPlugin) -> DriverClient {
        DriverClient::connect(Arc::new(mock)).await.unwrap()
    }

    async fn next<T: StreamItem>(stream: &mut DriverStream<T>) -> Option<T> {
        tokio::time::timeout(Duration::from_millis(100), stream.recv())
            .await
            .expect("timeout")
    }

    #[tokio::test]
    async fn test_connect_ok() {
        let client = connect(MockDriverPlugin::new()).await;
        assert_eq!(client.name(), "mock_driver");
        assert_eq!(client.info().plugin_version, "v0.2.1");
        assert_eq!(client.api_version(), "v0.1.0");
    }

    #[tokio::test]
    async fn test_connect_unknown_type() {
        let mock = MockDriverPlugin::new().with_plugin_info(|| {
            let mut info = PluginInfo::driver("mock_driver", "v0.2.1");
            info.plugin_type = "bad".into();
            Ok(info)
        });
        let err = DriverClient::connect(Arc::new(mock)).await.unwrap_err();
        assert!(err.to_string().contains("unknown type"));
    }

    #[tokio::test]
    async fn test_connect_capabilities_error() {
        let mock = MockDriverPlugin::new().with_capabilities(|| Err(test_error()));
        let err = DriverClient::connect(Arc::new(mock)).await.unwrap_err();
        assert_eq!(err, test_error());
    }

    #[tokio::test]
    async fn test_capabilities_queried_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mock = MockDriverPlugin::new().with_capabilities(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Capabilities {
                send_signals: true,
                exec: false,
                ..Default::default()
            })
        });

        let client = connect(mock).await;
        let first = client.capabilities().clone();
        assert_eq!(&first, client.capabilities());
        assert!(first.send_signals);
        assert!(!first.exec);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fingerprint_ok() {
        let fingerprint = Fingerprint::healthy("very healthy").with_attribute("driver.mock", "1");
        let sent = fingerprint.clone();
        let mock = MockDriverPlugin::new().with_fingerprint(move |_| {
            let (tx, rx) = mpsc::channel(1);
            tx.try_send(sent.clone()).unwrap();
            Ok(rx)
        });

        let client = connect(mock).await;
        let mut stream = client.fingerprint(&CancellationToken::new()).await.unwrap();
        assert_eq!(next(&mut stream).await, Some(fingerprint));
    }

    #[tokio::test]
    async fn test_fingerprint_open_error() {
        let mock = MockDriverPlugin::new().with_fingerprint(|_| Err(test_error()));
        let client = connect(mock).await;
        let err = client
            .fingerprint(&CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("test error"));
    }

    #[tokio::test]
    async fn test_fingerprint_driver_error() {
        let mock = MockDriverPlugin::new().with_fingerprint(|_| {
            let (tx, rx) = mpsc::channel(1);
            let mut fault = Fingerprint::default();
            fault.err = Some(test_error());
            tx.try_send(fault).unwrap();
            Ok(rx)
        });

        let client = connect(mock).await;
        let mut stream = client.fingerprint(&CancellationToken::new()).await.unwrap();
        let result = next(&mut stream).await.unwrap();
        assert!(result.err.unwrap().to_string().contains("test error"));
        assert!(next(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn test_fingerprint_channel_closed() {
        let mock = MockDriverPlugin::new().with_fingerprint(|_| {
            let (_, rx) = mpsc::channel(1);
            Ok(rx)
        });

        let client = connect(mock).await;
        let mut stream = client.fingerprint(&CancellationToken::new()).await.unwrap();
        let result = next(&mut stream).await.unwrap();
        assert_eq!(result.err, Some(DriverError::ChannelClosed));
        assert!(next(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn test_fingerprint_cancel_reaches_driver() {
        let seen: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        let mock = MockDriverPlugin::new().with_fingerprint(move |cancel| {
            *slot.lock().unwrap() = Some(cancel);
            let (_, rx) = mpsc::channel(1);
            Ok(rx)
        });

        let client = connect(mock).await;
        let parent = CancellationToken::new();
        let mut stream = client.fingerprint(&parent).await.unwrap();
        let driver_token = seen.lock().unwrap().clone().unwrap();
        assert!(!driver_token.is_cancelled());

        parent.cancel();
        assert!(next(&mut stream).await.is_none());
        assert!(driver_token.is_cancelled());
    }

    #[tokio::test]
    async fn test_recover_task() {
        let mock = MockDriverPlugin::new().with_recover_task(|handle| {
            assert_eq!(handle.version, 42);
            assert_eq!(handle.task_id().as_str(), TASK_ID);
            Ok(())
        });
        let client = connect(mock).await;
        let handle = TaskHandle::new(42, TaskConfig::new("web").with_id(TaskId::new(TASK_ID)))
            .with_state(TaskState::Running);
        client.recover_task(&handle).await.unwrap();

        let failing =
            connect(MockDriverPlugin::new().with_recover_task(|_| Err(test_error()))).await;
        assert_eq!(failing.recover_task(&handle).await.unwrap_err(), test_error());
    }

    #[tokio::test]
    async fn test_start_task_ok() {
        let mock = MockDriverPlugin::new().with_start_task(|config| {
            let network = DriverNetwork::new("127.0.0.1").with_port("http", 8080);
            Ok((
                TaskHandle::new(1, config).with_state(TaskState::Running),
                Some(network),
            ))
        });
        let client = connect(mock).await;

        let config = TaskConfig::new("web").with_id(TaskId::new(TASK_ID));
        let (handle, network) = client.start_task(config).await.unwrap();
        assert_eq!(handle.state, TaskState::Running);
        assert_eq!(handle.task_id().as_str(), TASK_ID);
        let network = network.unwrap();
        assert_eq!(network.ip, "127.0.0.1");
        assert_eq!(network.port_map.get("http"), Some(&8080));
    }

    #[tokio::test]
    async fn test_start_task_error() {
        let mock = MockDriverPlugin::new().with_start_task(|_| Err(test_error()));
        let client = connect(mock).await;
        let err = client.start_task(TaskConfig::new("web")).await.unwrap_err();
        assert_eq!(err, test_error());
    }

    #[tokio::test]
    async fn test_start_task_empty_network_dropped() {
        let mock = MockDriverPlugin::new().with_start_task(|config| {
            Ok((TaskHandle::new(1, config), Some(DriverNetwork::default())))
        });
        let client = connect(mock).await;
        let (_, network) = client.start_task(TaskConfig::new("web")).await.unwrap();
        assert!(network.is_none());
    }

    #[tokio::test]
    async fn test_start_task_unsupported_isolation_not_sent() {
        let started = Arc::new(AtomicUsize::new(0));
        let counter = started.clone();
        let mock = MockDriverPlugin::new().with_start_task(move |config| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok((TaskHandle::new(1, config), None))
        });
        let client = connect(mock).await;

        let config = TaskConfig::new("web").with_network_isolation(NetworkIsolationSpec {
            mode: NetIsolationMode::Group,
            ..Default::default()
        });
        let err = client.start_task(config).await.unwrap_err();
        assert!(matches!(err, DriverError::Unsupported(_)));
        assert!(!err.is_retryable());
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_start_task_mismatched_handle() {
        let mock = MockDriverPlugin::new().with_start_task(|config| {
            let other = config.with_id(TaskId::new("other"));
            Ok((TaskHandle::new(1, other), None))
        });
        let client = connect(mock).await;
        let err = client
            .start_task(TaskConfig::new("web").with_id(TaskId::new(TASK_ID)))
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Driver(_)));
    }

    #[tokio::test]
    async fn test_wait_task_ok() {
        let mock = MockDriverPlugin::new().with_wait_task(|_, task_id| {
            assert_eq!(task_id.as_str(), TASK_ID);
            let (tx, rx) = mpsc::channel(1);
            tx.try_send(ExitResult::new(1, 2)).unwrap();
            Ok(rx)
        });
        let client = connect(mock).await;
        let mut stream = client
            .wait_task(&CancellationToken::new(), &TaskId::new(TASK_ID))
            .await
            .unwrap();
        assert_eq!(next(&mut stream).await, Some(ExitResult::new(1, 2)));
        assert!(next(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn test_wait_task_open_error() {
        let mock = MockDriverPlugin::new().with_wait_task(|_, _| Err(test_error()));
        let client = connect(mock).await;
        let result = client
            .wait_task(&CancellationToken::new(), &TaskId::new(TASK_ID))
            .await;
        assert!(matches!(result, Err(e) if e == test_error()));
    }

    #[tokio::test]
    async fn test_wait_task_driver_error() {
        let mock = MockDriverPlugin::new().with_wait_task(|_, _| {
            let (tx, rx) = mpsc::channel(1);
            tx.try_send(ExitResult::from_error(test_error())).unwrap();
            Ok(rx)
        });
        let client = connect(mock).await;
        let mut stream = client
            .wait_task(&CancellationToken::new(), &TaskId::new(TASK_ID))
            .await
            .unwrap();
        let result = next(&mut stream).await.unwrap();
        assert!(!result.is_determined());
        assert_eq!(result.err, Some(test_error()));
    }

    #[tokio::test]
    async fn test_wait_task_channel_closed() {
        let mock = MockDriverPlugin::new().with_wait_task(|_, _| {
            let (_, rx) = mpsc::channel(1);
            Ok(rx)
        });
        let client = connect(mock).await;
        let mut stream = client
            .wait_task(&CancellationToken::new(), &TaskId::new(TASK_ID))
            .await
            .unwrap();
        let result = next(&mut stream).await.unwrap();
        assert_eq!(result.err, Some(DriverError::ChannelClosed));
        assert!(next(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn test_stop_task_passes_arguments() {
        let mock = MockDriverPlugin::new().with_stop_task(|task_id, timeout, signal| {
            assert_eq!(task_id.as_str(), TASK_ID);
            assert_eq!(timeout, Duration::from_secs(42));
            assert_eq!(signal, "test-signal");
            Ok(())
        });
        let client = connect(mock).await;
        client
            .stop_task(&TaskId::new(TASK_ID), Duration::from_secs(42), "test-signal")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_task_default_signal() {
        let mock = MockDriverPlugin::new().with_stop_task(|_, _, signal| {
            assert_eq!(signal, "SIGINT");
            Ok(())
        });
        let client = connect(mock).await;
        client
            .stop_task(&TaskId::new(TASK_ID), Duration::from_secs(1), "")
            .await
            .unwrap();

        let failing =
            connect(MockDriverPlugin::new().with_stop_task(|_, _, _| Err(test_error()))).await;
        assert!(failing
            .stop_task(&TaskId::new(TASK_ID), Duration::from_secs(1), "SIGTERM")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_destroy_task() {
        let forced = Arc::new(Mutex::new(Vec::new()));
        let log = forced.clone();
        let mock = MockDriverPlugin::new().with_destroy_task(move |task_id, force| {
            assert_eq!(task_id.as_str(), TASK_ID);
            log.lock().unwrap().push(force);
            Ok(())
        });
        let client = connect(mock).await;
        let id = TaskId::new(TASK_ID);
        client.destroy_task(&id, false).await.unwrap();
        client.destroy_task(&id, true).await.unwrap();
        assert_eq!(*forced.lock().unwrap(), vec![false, true]);

        let gone = connect(
            MockDriverPlugin::new()
                .with_destroy_task(|id, _| Err(DriverError::TaskNotFound(id.clone()))),
        )
        .await;
        assert!(gone.destroy_task(&id, true).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_inspect_task() {
        let mock = MockDriverPlugin::new().with_inspect_task(|task_id| {
            Ok(TaskStatus {
                id: task_id.clone(),
                name: "web".into(),
                state: TaskState::Exited,
                exit_result: Some(ExitResult::new(0, 0)),
                ..Default::default()
            })
        });
        let client = connect(mock).await;
        let status = client.inspect_task(&TaskId::new(TASK_ID)).await.unwrap();
        assert_eq!(status.id.as_str(), TASK_ID);
        assert_eq!(status.terminal_result(), Some(&ExitResult::new(0, 0)));

        let failing =
            connect(MockDriverPlugin::new().with_inspect_task(|_| Err(test_error()))).await;
        assert!(failing.inspect_task(&TaskId::new(TASK_ID)).await.is_err());
    }

    #[tokio::test]
    async fn test_task_stats_ok() {
        let usage = ResourceUsage {
            memory_stats: MemoryStats {
                rss: 42,
                usage: 42,
                ..Default::default()
            },
            cpu_stats: CpuStats {
                throttled_time: 42,
                ..Default::default()
            },
        };
        let reading = TaskResourceUsage::new(usage.clone()).with_pid("42", usage);
        let sent = reading.clone();
        let mock = MockDriverPlugin::new().with_task_stats(move |_, task_id, interval| {
            assert_eq!(task_id.as_str(), TASK_ID);
            assert_eq!(interval, Duration::from_secs(42));
            let (tx, rx) = mpsc::channel(1);
            tx.try_send(sent.clone()).unwrap();
            Ok(rx)
        });
        let client = connect(mock).await;
        let mut stream = client
            .task_stats(&CancellationToken::new(), &TaskId::new(TASK_ID), Duration::from_secs(42))
            .await
            .unwrap();

        let result = next(&mut stream).await.unwrap();
        assert_eq!(result, reading);
        assert_eq!(result.pids.len(), 1);
        // Driver dropped its sender after one reading.
        let closed = next(&mut stream).await.unwrap();
        assert_eq!(closed.err, Some(DriverError::ChannelClosed));
        assert!(next(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn test_task_events() {
        let mock = MockDriverPlugin::new().with_task_events(|_| {
            let (tx, rx) = mpsc::channel(2);
            let mut annotations = HashMap::new();
            annotations.insert("foo".to_string(), "bar".to_string());
            let mut event = TaskEvent::new(TaskId::new(TASK_ID), "web", "started");
            event.annotations = annotations;
            tx.try_send(event).unwrap();
            Ok(rx)
        });
        let client = connect(mock).await;
        let mut stream = client.task_events(&CancellationToken::new()).await.unwrap();

        let event = next(&mut stream).await.unwrap();
        assert_eq!(event.task_id.as_str(), TASK_ID);
        assert_eq!(event.annotations.get("foo").map(String::as_str), Some("bar"));
        let closed = next(&mut stream).await.unwrap();
        assert!(closed.err.unwrap().is_channel_closed());
        assert!(next(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn test_signal_task() {
        let mock = MockDriverPlugin::new().with_signal_task(|task_id, signal| {
            assert_eq!(task_id.as_str(), TASK_ID);
            assert_eq!(signal, "SIGUSR1");
            Ok(())
        });
        let client = connect(mock).await;
        client.signal_task(&TaskId::new(TASK_ID), "SIGUSR1").await.unwrap();
    }

    #[tokio::test]
    async fn test_signal_task_unsupported() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = delivered.clone();
        let mock = MockDriverPlugin::new()
            .with_capabilities(|| Ok(Capabilities::default()))
            .with_signal_task(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        let client = connect(mock).await;
        let err = client
            .signal_task(&TaskId::new(TASK_ID), "SIGUSR1")
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Unsupported(_)));
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exec_task() {
        let mock = MockDriverPlugin::new().with_exec_task(|task_id, cmd, timeout| {
            assert_eq!(task_id.as_str(), TASK_ID);
            assert_eq!(cmd, vec!["/bin/sh".to_string(), "-c".into(), "echo hi".into()]);
            assert_eq!(timeout, Duration::from_secs(10));
            Ok(ExecTaskResult {
                stdout: b"stdout content".to_vec(),
                stderr: Vec::new(),
                exit_result: ExitResult::new(42, 0),
            })
        });
        let client = connect(mock).await;
        let result = client
            .exec_task(
                &TaskId::new(TASK_ID),
                vec!["/bin/sh".into(), "-c".into(), "echo hi".into()],
                Duration::from_secs(10),
            )
            .await
            .unwrap();
        assert_eq!(result.stdout_lossy(), "stdout content");
        assert_eq!(result.exit_result.exit_code, 42);
    }

    #[tokio::test]
    async fn test_exec_task_rejected() {
        let client =
            connect(MockDriverPlugin::new().with_exec_task(|_, _, _| Err(test_error()))).await;
        let id = TaskId::new(TASK_ID);
        assert!(matches!(
            client.exec_task(&id, Vec::new(), Duration::from_secs(1)).await,
            Err(DriverError::InvalidConfig(_))
        ));
        assert_eq!(
            client
                .exec_task(&id, vec!["true".into()], Duration::from_secs(1))
                .await
                .unwrap_err(),
            test_error()
        );

        let no_exec = connect(
            MockDriverPlugin::new().with_capabilities(|| Ok(Capabilities::default())),
        )
        .await;
        assert!(matches!(
            no_exec.exec_task(&id, vec!["true".into()], Duration::from_secs(1)).await,
            Err(DriverError::Unsupported(_))
        ));
    }
}
