//! End-to-end runs through `app::run` with an in-memory exporter.

use std::sync::Arc;

use parking_lot::Mutex;

use histogram_bench::app;
use histogram_bench::export::{Exporter, MemoryExporter};
use histogram_bench::metrics::{Buckets, Unit};
use histogram_bench::report::ComparisonReport;
use histogram_bench::WorkloadConfig;

fn config(iterations: u64, seed: u64) -> WorkloadConfig {
    WorkloadConfig {
        iterations,
        seed: Some(seed),
        ..Default::default()
    }
}

#[tokio::test]
async fn every_sample_reaches_every_instrument() {
    let sink = MemoryExporter::new(64);
    let report = Arc::new(Mutex::new(ComparisonReport::new()));
    let outcome = app::run(&config(50_000, 42), vec![Exporter::Memory(sink.clone())], None, report)
        .await
        .unwrap();

    assert_eq!(outcome.summary.iterations, 50_000);
    assert_eq!(outcome.export.failures, 0);

    let batches = sink.batches();
    assert!(!batches.is_empty());
    for name in ["exponential-ms", "explicit-ms", "exponential-ns", "explicit-ns"] {
        let total: u64 = batches.iter().map(|b| b.metric(name).unwrap().point.count).sum();
        assert_eq!(total, 50_000, "{name}");
    }

    let sum = |name: &str| -> i64 { batches.iter().map(|b| b.metric(name).unwrap().point.sum).sum() };
    assert_eq!(sum("explicit-ns"), sum("explicit-ms") * 1_000_000);
    assert_eq!(sum("exponential-ns"), sum("exponential-ms") * 1_000_000);

    let reference: u64 = batches
        .iter()
        .map(|b| b.reference_for(Unit::Nanoseconds).unwrap().count)
        .sum();
    assert_eq!(reference, 50_000);
}

#[tokio::test]
async fn nanosecond_explicit_instrument_only_fills_overflow() {
    let sink = MemoryExporter::new(64);
    let report = Arc::new(Mutex::new(ComparisonReport::new()));
    app::run(&config(10_000, 7), vec![Exporter::Memory(sink.clone())], None, report)
        .await
        .unwrap();

    for batch in sink.batches() {
        let point = &batch.metric("explicit-ns").unwrap().point;
        let Buckets::Explicit { bounds, counts } = &point.buckets else {
            panic!("explicit-ns must use explicit buckets");
        };
        assert_eq!(bounds, &vec![0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 1000.0]);
        assert_eq!(counts[10], point.count);
    }
}

#[tokio::test]
async fn exponential_instruments_respect_max_size() {
    let sink = MemoryExporter::new(64);
    let report = Arc::new(Mutex::new(ComparisonReport::new()));
    let outcome = app::run(&config(20_000, 3), vec![Exporter::Memory(sink.clone())], None, report)
        .await
        .unwrap();

    for batch in sink.batches() {
        for name in ["exponential-ms", "exponential-ns"] {
            let Buckets::Exponential { counts, .. } = &batch.metric(name).unwrap().point.buckets else {
                panic!("{name} must use exponential buckets");
            };
            assert!(counts.len() <= 160);
        }
    }
    assert_eq!(outcome.report.instruments.len(), 4);
    assert_eq!(outcome.report.instrument("explicit-ns").unwrap().overflow_share, 1.0);
}

#[tokio::test]
async fn invalid_workload_fails_before_running() {
    let report = Arc::new(Mutex::new(ComparisonReport::new()));
    let bad = WorkloadConfig {
        iterations: 0,
        ..Default::default()
    };
    assert!(app::run(&bad, Vec::new(), None, report).await.is_err());
}
