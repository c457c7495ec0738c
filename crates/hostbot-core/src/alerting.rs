//! Periodic threshold alerts.
//!
//! Runs beside the dispatcher on its own task. Every tick evaluates CPU, then
//! memory, then each disk; a crossed threshold sends one notification for that
//! tick. There is no suppression across ticks: a metric that stays above its
//! threshold is reported again on every tick.

use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    config::MonitoringConfig, domain::ChatId, formatting::escape_html,
    messaging::port::MessagingPort, telemetry::TelemetrySource,
};

/// Thresholds in percent; 0 disables the check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Thresholds {
    pub cpu: u32,
    pub memory: u32,
    /// Minimum free space per disk.
    pub disk_free: u32,
}

impl From<&MonitoringConfig> for Thresholds {
    fn from(cfg: &MonitoringConfig) -> Self {
        Self {
            cpu: cfg.cpu_threshold,
            memory: cfg.memory_threshold,
            disk_free: cfg.disk_threshold,
        }
    }
}

pub struct AlertMonitor {
    thresholds: Thresholds,
    telemetry: Arc<dyn TelemetrySource>,
    messenger: Arc<dyn MessagingPort>,
    destination: ChatId,
    /// Where a delivery failure is reported (first allowed chat).
    fallback: Option<ChatId>,
}

/// Handle to a running alert loop. Dropping it does not stop the loop.
pub struct AlertLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl AlertLoop {
    /// Signal the loop to stop and wait for it. A tick in progress finishes first.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!(error = %e, "alert loop task failed");
        }
    }
}

impl AlertMonitor {
    pub fn new(
        thresholds: Thresholds,
        telemetry: Arc<dyn TelemetrySource>,
        messenger: Arc<dyn MessagingPort>,
        destination: ChatId,
        fallback: Option<ChatId>,
    ) -> Self {
        Self {
            thresholds,
            telemetry,
            messenger,
            destination,
            fallback,
        }
    }

    /// Start ticking every `period`. The first check runs one period from now.
    pub fn start(self, period: Duration) -> AlertLoop {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let monitor = Arc::new(self);

        info!(
            interval_secs = period.as_secs(),
            cpu = monitor.thresholds.cpu,
            memory = monitor.thresholds.memory,
            disk_free = monitor.thresholds.disk_free,
            destination = monitor.destination.0,
            "alert loop started"
        );

        let handle = tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + period, period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                  _ = token.cancelled() => break,
                  _ = tick.tick() => {
                    monitor.check_once().await;
                  }
                }
            }
            info!("alert loop stopped");
        });

        AlertLoop { cancel, handle }
    }

    /// Run one round of checks. Returns the number of alerts raised.
    ///
    /// A telemetry failure ends the round: metrics later in the sequence are
    /// not checked until the next tick.
    pub async fn check_once(&self) -> usize {
        let mut raised = 0usize;

        if self.thresholds.cpu > 0 {
            let cpu = match self.telemetry.cpu_snapshot().await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "alert check: cpu sample failed");
                    return raised;
                }
            };
            if cpu.load_percent > f64::from(self.thresholds.cpu) {
                self.notify(&format!(
                    "⚠️ High CPU load: {:.2}% (threshold: {}%)",
                    cpu.load_percent, self.thresholds.cpu
                ))
                .await;
                raised += 1;
            }
        }

        if self.thresholds.memory > 0 {
            let mem = match self.telemetry.memory_snapshot().await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "alert check: memory sample failed");
                    return raised;
                }
            };
            if mem.used_percent > f64::from(self.thresholds.memory) {
                self.notify(&format!(
                    "⚠️ High memory usage: {:.2}% (threshold: {}%)",
                    mem.used_percent, self.thresholds.memory
                ))
                .await;
                raised += 1;
            }
        }

        if self.thresholds.disk_free > 0 {
            let disks = match self.telemetry.disk_snapshots().await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "alert check: disk sample failed");
                    return raised;
                }
            };
            for disk in disks {
                let free = disk.free_percent();
                if free < f64::from(self.thresholds.disk_free) {
                    self.notify(&format!(
                        "⚠️ Low disk space on {}: {:.2}% free (threshold: {}%)",
                        escape_html(&disk.mount_point),
                        free,
                        self.thresholds.disk_free
                    ))
                    .await;
                    raised += 1;
                }
            }
        }

        raised
    }

    /// Deliver one alert. On failure, report once to the fallback chat and give up.
    async fn notify(&self, text: &str) {
        let Err(e) = self.messenger.send_html(self.destination, text).await else {
            return;
        };
        error!(
            chat_id = self.destination.0,
            error = %e,
            alert = text,
            "failed to deliver alert"
        );

        let Some(fallback) = self.fallback else {
            return;
        };
        let notice = format!(
            "❌ Failed to deliver alert: {}\nMessage: {text}",
            escape_html(&e.to_string())
        );
        if let Err(e) = self.messenger.send_html(fallback, &notice).await {
            error!(chat_id = fallback.0, error = %e, "fallback alert delivery failed");
        }
    }
}
