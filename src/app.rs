use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::WorkloadConfig;
use crate::error::Result;
use crate::export::{ExportScheduler, ExportStats, Exporter, OtlpCollector};
use crate::generator::MixtureGenerator;
use crate::metrics::MeterRegistry;
use crate::pipeline::{RecordingPipeline, RunSummary};
use crate::report::ComparisonReport;

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub export: ExportStats,
    pub report: ComparisonReport,
}

/// Build the instruments and generator, start the export scheduler, run
/// the generation loop to completion on a blocking thread, then flush.
/// `collector`, when given, gets its own delta reader on the same
/// instruments and is flushed on the way out.
pub async fn run(
    config: &WorkloadConfig,
    exporters: Vec<Exporter>,
    collector: Option<OtlpCollector>,
    report: Arc<Mutex<ComparisonReport>>,
) -> Result<RunOutcome> {
    config.validate()?;

    let readers = collector
        .into_iter()
        .map(|c| c.into_reader(config.export_interval()))
        .collect();
    let registry = Arc::new(MeterRegistry::with_readers(config, readers));
    let pipeline = RecordingPipeline::new(registry.clone())?;
    let mut generator = MixtureGenerator::from_config(config)?;

    report.lock().workload = config.describe_mixture();
    let scheduler = ExportScheduler::new(registry.clone(), exporters, config.export_interval())
        .with_report(report.clone())
        .spawn();

    let iterations = config.iterations;
    tracing::info!(iterations, seed = ?config.seed, "generation started");
    let generation = tokio::task::spawn_blocking(move || pipeline.run(&mut generator, iterations)).await;

    // Flush whatever was recorded even if the loop panicked
    let export = scheduler.shutdown().await;
    let provider = registry.clone();
    match tokio::task::spawn_blocking(move || provider.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "meter provider shutdown failed"),
        Err(e) => tracing::warn!(error = %e, "meter provider shutdown panicked"),
    }
    let summary = generation?;
    tracing::info!(
        iterations = summary.iterations,
        elapsed_secs = summary.elapsed_secs,
        samples_per_sec = summary.samples_per_sec as u64,
        "generation finished"
    );

    let report = report.lock().clone();
    Ok(RunOutcome {
        summary,
        export,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::MemoryExporter;
    use std::time::Duration;

    const CAPACITY: usize = 10_000;

    #[tokio::test]
    async fn broken_and_slow_exporters_lose_no_samples() {
        let iterations = 200_000;
        let config = WorkloadConfig {
            iterations,
            seed: Some(11),
            export_interval_ms: 20,
            ..Default::default()
        };
        let sink = MemoryExporter::new(CAPACITY);
        let report = Arc::new(Mutex::new(ComparisonReport::new()));
        let exporters = vec![
            Exporter::Failing,
            Exporter::Slow(Duration::from_millis(50)),
            Exporter::Memory(sink.clone()),
        ];

        let outcome = run(&config, exporters, None, report).await.unwrap();

        assert_eq!(outcome.summary.iterations, iterations);
        assert!(outcome.export.failures > 0);
        assert_eq!(outcome.export.failures, outcome.export.ticks + 1);

        let batches = sink.batches();
        assert!(batches.len() < CAPACITY);
        assert_eq!(outcome.report.windows, batches.len() as u64);
        for name in ["exponential-ms", "explicit-ms", "exponential-ns", "explicit-ns"] {
            let total: u64 = batches.iter().map(|b| b.metric(name).unwrap().point.count).sum();
            assert_eq!(total, iterations, "{name}");
            assert_eq!(outcome.report.instrument(name).unwrap().count, iterations, "{name}");
        }
        assert!(outcome.report.workload.contains("gamma(shape=1, scale=2)"));
    }
}
