use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::Exporter;
use crate::metrics::MeterRegistry;
use crate::report::ComparisonReport;

/// Drains the registry every `interval` and hands the batch to each
/// exporter. Runs beside the generation loop and never reports back to it.
pub struct ExportScheduler {
    registry: Arc<MeterRegistry>,
    exporters: Vec<Exporter>,
    interval: Duration,
    report: Option<Arc<Mutex<ComparisonReport>>>,
}

/// Returned when the scheduler stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    /// Timer ticks, not counting the final flush
    pub ticks: u64,
    pub exported: u64,
    pub failures: u64,
}

pub struct ExportHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<ExportStats>,
}

impl ExportScheduler {
    pub fn new(registry: Arc<MeterRegistry>, exporters: Vec<Exporter>, interval: Duration) -> Self {
        Self {
            registry,
            exporters,
            interval,
            report: None,
        }
    }

    /// Fold every batch into `report` before it is exported.
    pub fn with_report(mut self, report: Arc<Mutex<ComparisonReport>>) -> Self {
        self.report = Some(report);
        self
    }

    pub fn spawn(self) -> ExportHandle {
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(self.run(rx));
        ExportHandle {
            shutdown: Some(tx),
            task,
        }
    }

    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> ExportStats {
        // First tick one full interval from now, not immediately
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            exporters = ?self.exporters.iter().map(|e| e.name()).collect::<Vec<_>>(),
            "export scheduler started"
        );

        let mut stats = ExportStats::default();
        loop {
            tokio::select! {
                biased;
                _ = ticker.tick() => {
                    stats.ticks += 1;
                    self.flush(&mut stats).await;
                }
                // Sent or dropped: either way, stop
                _ = &mut shutdown => break,
            }
        }

        // Trailing partial window
        self.flush(&mut stats).await;
        tracing::info!(ticks = stats.ticks, exported = stats.exported, failures = stats.failures, "export scheduler stopped");
        stats
    }

    async fn flush(&mut self, stats: &mut ExportStats) {
        let batch = self.registry.collect();
        tracing::debug!(sequence = batch.sequence, measurements = batch.total_count(), "export window closed");

        if let Some(report) = &self.report {
            report.lock().observe(&batch);
        }

        for exporter in &mut self.exporters {
            match exporter.export(&batch).await {
                Ok(()) => stats.exported += 1,
                Err(e) => {
                    stats.failures += 1;
                    tracing::warn!(exporter = exporter.name(), sequence = batch.sequence, error = %e, "export failed");
                }
            }
        }
    }
}

impl ExportHandle {
    /// Stop the timer, flush the last window, and wait for the task.
    pub async fn shutdown(mut self) -> ExportStats {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(error = %e, "export task did not finish cleanly");
                ExportStats::default()
            }
        }
    }
}
