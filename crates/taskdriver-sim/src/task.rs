//! Supervision state of one simulated task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use taskdriver_core::signal::{is_terminating, SIGKILL};
use taskdriver_core::stats::{cpu, memory};
use taskdriver_core::{
    CpuStats, DriverError, DriverNetwork, ExitResult, MemoryStats, ResourceUsage, Result,
    StreamItem, TaskConfig, TaskEvent, TaskResourceUsage, TaskState, TaskStatus,
};

use crate::config::SimTaskConfig;

/// Driver-private state stored in the task handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct HandleState {
    pub started_at: DateTime<Utc>,
    pub pid: u32,
}

/// A simulated workload and everything the driver tracks about it.
pub(crate) struct SimTask {
    pub config: TaskConfig,
    pub workload: SimTaskConfig,
    pub pid: u32,
    status: RwLock<TaskStatus>,
    exit_tx: watch::Sender<Option<ExitResult>>,
    signal_tx: mpsc::Sender<i32>,
    events: broadcast::Sender<TaskEvent>,
    /// Cancelled once a destroy of this task begins.
    terminating: CancellationToken,
    launched: Instant,
    peak_rss: AtomicU64,
}

impl SimTask {
    /// Create the task and start its run loop. The task exits on its own
    /// after `run_for`, or runs until signalled when it is `None`.
    pub fn launch(
        config: TaskConfig,
        workload: SimTaskConfig,
        state: &HandleState,
        network: Option<DriverNetwork>,
        run_for: Option<Duration>,
        events: broadcast::Sender<TaskEvent>,
    ) -> Arc<Self> {
        let status = TaskStatus {
            id: config.id.clone(),
            name: config.name.clone(),
            state: TaskState::Running,
            started_at: Some(state.started_at),
            completed_at: None,
            exit_result: None,
            driver_attributes: [("pid".to_string(), state.pid.to_string())].into(),
            network,
        };

        let (exit_tx, _) = watch::channel(None);
        let (signal_tx, signal_rx) = mpsc::channel(8);

        let task = Arc::new(Self {
            config,
            workload,
            pid: state.pid,
            status: RwLock::new(status),
            exit_tx,
            signal_tx,
            events,
            terminating: CancellationToken::new(),
            launched: Instant::now(),
            peak_rss: AtomicU64::new(0),
        });

        tokio::spawn(supervise(task.clone(), signal_rx, run_for));
        task
    }

    /// Current snapshot.
    pub async fn status(&self) -> TaskStatus {
        self.status.read().await.clone()
    }

    /// Returns true once the run loop has finished.
    pub fn is_exited(&self) -> bool {
        self.exit_tx.borrow().is_some()
    }

    pub fn subscribe_exit(&self) -> watch::Receiver<Option<ExitResult>> {
        self.exit_tx.subscribe()
    }

    /// Wait for the run loop to finish.
    pub async fn wait_exit(&self) -> ExitResult {
        let mut rx = self.exit_tx.subscribe();
        exited(&mut rx)
            .await
            .unwrap_or_else(|| ExitResult::from_error(DriverError::ChannelClosed))
    }

    /// Deliver a signal to the run loop.
    pub async fn signal(&self, signal: i32) -> Result<()> {
        if self.is_exited() {
            return Err(DriverError::TaskNotRunning(self.config.id.clone()));
        }
        self.signal_tx
            .send(signal)
            .await
            .map_err(|_| DriverError::TaskNotRunning(self.config.id.clone()))
    }

    /// Kill without waiting. Used when the driver goes away.
    pub fn kill_now(&self) {
        let _ = self.signal_tx.try_send(SIGKILL);
    }

    /// Mark the task as being destroyed.
    pub fn begin_terminating(&self) {
        self.terminating.cancel();
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating.is_cancelled()
    }

    /// Resolves once a destroy of this task began.
    pub async fn terminating(&self) {
        self.terminating.cancelled().await
    }

    /// Usage reading for a live task.
    pub fn sample(&self) -> TaskResourceUsage {
        let rss = self.workload.memory_rss_bytes;
        let peak = self.peak_rss.fetch_max(rss, Ordering::Relaxed).max(rss);

        let usage = ResourceUsage {
            memory_stats: MemoryStats {
                rss,
                usage: rss,
                max_usage: peak,
                measured: vec![
                    memory::RSS.to_string(),
                    memory::USAGE.to_string(),
                    memory::MAX_USAGE.to_string(),
                ],
                ..Default::default()
            },
            cpu_stats: CpuStats {
                total_ticks: self.launched.elapsed().as_millis() as f64,
                measured: vec![cpu::TOTAL_TICKS.to_string()],
                ..Default::default()
            },
        };
        TaskResourceUsage::new(usage.clone()).with_pid(self.pid.to_string(), usage)
    }

    /// Final reading once the task exited: only the peak is meaningful.
    pub fn peak_sample(&self) -> TaskResourceUsage {
        let peak = self
            .peak_rss
            .load(Ordering::Relaxed)
            .max(self.workload.memory_rss_bytes);
        TaskResourceUsage::new(ResourceUsage {
            memory_stats: MemoryStats {
                max_usage: peak,
                measured: vec![memory::MAX_USAGE.to_string()],
                ..Default::default()
            },
            cpu_stats: CpuStats::default(),
        })
    }

    /// Publish an event for this task. Events without subscribers are dropped.
    pub fn emit(&self, message: impl Into<String>, annotations: &[(&str, String)]) {
        let mut event = TaskEvent::new(self.config.id.clone(), &self.config.name, message)
            .with_alloc(&self.config.alloc_id);
        for (key, value) in annotations {
            event = event.with_annotation(*key, value.clone());
        }
        let _ = self.events.send(event);
    }

    fn completion(&self) -> ExitResult {
        let mut result = ExitResult::new(self.workload.exit_code, self.workload.exit_signal);
        if let Some(msg) = &self.workload.exit_err_msg {
            result.err = Some(DriverError::driver(msg.clone()));
        }
        result
    }

    async fn finish(&self, result: ExitResult) {
        {
            let mut status = self.status.write().await;
            status.state = if result.is_determined() {
                TaskState::Exited
            } else {
                TaskState::Unknown
            };
            status.completed_at = Some(Utc::now());
            status.exit_result = Some(result.clone());
        }

        info!(
            task_id = %self.config.id,
            exit_code = result.exit_code,
            signal = result.signal,
            determined = result.is_determined(),
            "Task exited"
        );
        self.emit(
            "Task exited",
            &[
                ("exit_code", result.exit_code.to_string()),
                ("signal", result.signal.to_string()),
            ],
        );
        self.exit_tx.send_replace(Some(result));
    }
}

/// Resolves with the exit result once published, or `None` if the task
/// was dropped without one.
pub(crate) async fn exited(rx: &mut watch::Receiver<Option<ExitResult>>) -> Option<ExitResult> {
    rx.wait_for(Option::is_some).await.ok().and_then(|r| r.clone())
}

/// Sleep until `deadline`, or forever when there is none.
pub(crate) async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Run loop: exits when the workload completes, on SIGKILL, or after the
/// grace period that follows a terminating signal.
async fn supervise(
    task: Arc<SimTask>,
    mut signals: mpsc::Receiver<i32>,
    run_for: Option<Duration>,
) {
    let run_deadline = run_for.map(|d| Instant::now() + d);
    let mut kill: Option<(Instant, i32)> = None;

    let result = loop {
        tokio::select! {
            _ = sleep_until(run_deadline) => break task.completion(),
            _ = sleep_until(kill.map(|(at, _)| at)) => {
                let signal = kill.map(|(_, sig)| sig).unwrap_or(SIGKILL);
                break ExitResult::signaled(signal);
            }
            Some(signal) = signals.recv() => {
                task.emit("Received signal", &[("signal", signal.to_string())]);
                if signal == SIGKILL {
                    break ExitResult::signaled(SIGKILL);
                }
                if !is_terminating(signal) {
                    continue;
                }
                if task.workload.kill_after_ms == 0 {
                    break ExitResult::signaled(signal);
                }
                if kill.is_none() {
                    debug!(task_id = %task.config.id, signal, "Task shutting down");
                    kill = Some((Instant::now() + task.workload.kill_after(), signal));
                }
            }
        }
    };

    task.finish(result).await;
}
