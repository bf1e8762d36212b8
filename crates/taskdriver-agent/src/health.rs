//! Driver health tracking.
//!
//! Consumes the fingerprint stream and keeps only the latest value.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use taskdriver_core::{Fingerprint, HealthState};
use taskdriver_plugin::{CancellationToken, DriverClient};

use crate::error::AgentError;

/// Last-value view of a driver's fingerprint stream.
#[derive(Debug)]
pub struct HealthMonitor {
    rx: watch::Receiver<Fingerprint>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl HealthMonitor {
    /// Open the fingerprint stream and start tracking it.
    ///
    /// Until the first value arrives the driver counts as undetected.
    pub async fn spawn(
        client: &DriverClient,
        cancel: &CancellationToken,
    ) -> Result<Self, AgentError> {
        let cancel = cancel.child_token();
        let mut stream = client.fingerprint(&cancel).await?;
        let (tx, rx) = watch::channel(Fingerprint::default());
        let driver = client.name().to_string();

        let task = tokio::spawn(async move {
            let mut last = HealthState::Undetected;
            while let Some(fp) = stream.recv().await {
                if let Some(err) = &fp.err {
                    error!(driver = %driver, error = %err, "Driver fingerprint failed");
                } else if fp.health != last {
                    match fp.health {
                        HealthState::Healthy => info!(
                            driver = %driver,
                            description = %fp.health_description,
                            "Driver healthy"
                        ),
                        _ => warn!(
                            driver = %driver,
                            health = ?fp.health,
                            description = %fp.health_description,
                            "Driver health changed"
                        ),
                    }
                }
                last = fp.health;
                tx.send_replace(fp);
            }
            debug!(driver = %driver, "Fingerprint stream ended");
        });

        Ok(Self { rx, cancel, task })
    }

    /// Latest fingerprint.
    pub fn current(&self) -> Fingerprint {
        self.rx.borrow().clone()
    }

    /// Returns true if the latest fingerprint is healthy.
    pub fn is_healthy(&self) -> bool {
        self.rx.borrow().is_healthy()
    }

    /// Fail unless the driver can take new tasks.
    ///
    /// An undetected driver is given the benefit of the doubt; only an
    /// explicit unhealthy report or a fault blocks starts.
    pub fn check(&self) -> Result<(), AgentError> {
        let fp = self.rx.borrow();
        if let Some(err) = &fp.err {
            return Err(AgentError::DriverUnhealthy(err.to_string()));
        }
        if fp.health == HealthState::Unhealthy {
            return Err(AgentError::DriverUnhealthy(fp.health_description.clone()));
        }
        Ok(())
    }

    /// Wait until the next fingerprint value is observed.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Returns true once the fingerprint stream has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use taskdriver_core::DriverError;
    use taskdriver_plugin::mock::MockDriverPlugin;
    use taskdriver_sim::{SimDriver, SimDriverConfig};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_tracks_latest_value() {
        let config = SimDriverConfig {
            fingerprint_period_ms: 10,
            ..Default::default()
        };
        let client = DriverClient::connect(Arc::new(SimDriver::new(config)))
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        let mut monitor = HealthMonitor::spawn(&client, &cancel).await.unwrap();

        assert!(monitor.changed().await);
        assert!(monitor.is_healthy());
        assert!(monitor.check().is_ok());
        assert_eq!(monitor.current().health, HealthState::Healthy);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !monitor.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_fault_blocks_starts() {
        let config = SimDriverConfig {
            fingerprint_period_ms: 10,
            fault_after_ms: Some(20),
            ..Default::default()
        };
        let client = DriverClient::connect(Arc::new(SimDriver::new(config)))
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        let mut monitor = HealthMonitor::spawn(&client, &cancel).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while monitor.current().err.is_none() {
                assert!(monitor.changed().await);
            }
        })
        .await
        .unwrap();

        assert!(!monitor.is_healthy());
        assert!(matches!(monitor.check(), Err(AgentError::DriverUnhealthy(_))));
    }

    #[tokio::test]
    async fn test_driver_crash_marks_unhealthy() {
        let mock = MockDriverPlugin::new().with_fingerprint(|_cancel| {
            let (tx, rx) = mpsc::channel(1);
            drop(tx);
            Ok(rx)
        });
        let client = DriverClient::connect(Arc::new(mock)).await.unwrap();
        let cancel = CancellationToken::new();
        let mut monitor = HealthMonitor::spawn(&client, &cancel).await.unwrap();

        assert!(monitor.changed().await);
        let fp = monitor.current();
        assert_eq!(fp.err, Some(DriverError::ChannelClosed));
        assert!(monitor.check().is_err());
    }

    #[tokio::test]
    async fn test_open_failure_is_call_error() {
        let mock = MockDriverPlugin::new()
            .with_fingerprint(|_cancel| Err(DriverError::driver("no runtime")));
        let client = DriverClient::connect(Arc::new(mock)).await.unwrap();
        let err = HealthMonitor::spawn(&client, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Driver(DriverError::Driver(_))));
    }
}
