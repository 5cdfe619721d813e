use std::sync::Arc;

use chrono::{DateTime, Utc};
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use parking_lot::Mutex;

use super::data::{ExportBatch, HistogramPoint, MetricData, ReferenceWindow, Resource};
use super::instrument::HistogramInstrument;
use super::reader::WindowReader;
use super::reference::ReferenceRecorder;
use super::strategy::{select_strategy, strategy_view, Unit, INSTRUMENTS};
use crate::config::WorkloadConfig;
use crate::error::Result;

/// Instrumentation scope of the four histograms.
pub const METER_NAME: &str = "histogram-bench";

/// Owns the meter provider, the four histogram instruments and the
/// per-unit references. The generation loop writes through the
/// instruments; the export scheduler drains through `collect`.
pub struct MeterRegistry {
    provider: SdkMeterProvider,
    reader: WindowReader,
    resource: Resource,
    instruments: Vec<Arc<HistogramInstrument>>,
    references: [ReferenceRecorder; 2],
    window: Mutex<Window>,
}

struct Window {
    sequence: u64,
    started: DateTime<Utc>,
}

impl MeterRegistry {
    pub fn new(config: &WorkloadConfig) -> Self {
        Self::with_readers(config, Vec::new())
    }

    /// `readers` see the same instruments and bucket views as the window
    /// reader but keep their own delta state and timer.
    pub fn with_readers(config: &WorkloadConfig, readers: Vec<PeriodicReader>) -> Self {
        let resource = Resource::new(config.service_name.clone());
        let reader = WindowReader::new();

        let mut builder = SdkMeterProvider::builder()
            .with_resource(resource.to_sdk())
            .with_view(strategy_view(config))
            .with_reader(reader.clone());
        for extra in readers {
            builder = builder.with_reader(extra);
        }
        let provider = builder.build();
        let meter = provider.meter(METER_NAME);

        let instruments = INSTRUMENTS
            .iter()
            .map(|&(name, unit)| {
                let strategy = select_strategy(name, unit, config);
                tracing::info!(instrument = name, unit = unit.symbol(), ?strategy, "registered histogram");
                Arc::new(HistogramInstrument::new(&meter, name, unit, strategy))
            })
            .collect();

        Self {
            provider,
            reader,
            resource,
            instruments,
            references: [
                ReferenceRecorder::new(Unit::Milliseconds),
                ReferenceRecorder::new(Unit::Nanoseconds),
            ],
            window: Mutex::new(Window {
                sequence: 0,
                started: Utc::now(),
            }),
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn instruments(&self) -> &[Arc<HistogramInstrument>] {
        &self.instruments
    }

    pub fn instrument(&self, name: &str) -> Option<Arc<HistogramInstrument>> {
        self.instruments.iter().find(|i| i.name() == name).cloned()
    }

    pub fn record_reference(&self, unit: Unit, value: i64) {
        if let Some(r) = self.references.iter().find(|r| r.unit() == unit) {
            r.record(value);
        }
    }

    /// Close the current window and open the next. Instruments the SDK
    /// reports nothing for still contribute a zero-count point.
    pub fn collect(&self) -> ExportBatch {
        let drained = self.reader.drain();
        let now = Utc::now();
        let (sequence, window_start) = {
            let mut w = self.window.lock();
            let opened = (w.sequence, w.started);
            w.sequence += 1;
            w.started = now;
            opened
        };

        let mut points = Vec::new();
        match drained {
            Ok(rm) => {
                for metric in rm.scope_metrics.iter().flat_map(|sm| sm.metrics.iter()) {
                    if let Some(point) = HistogramPoint::from_sdk(metric) {
                        points.push((metric.name.to_string(), point));
                    }
                }
            }
            Err(e) => tracing::warn!(sequence, error = %e, "window drain failed; exporting zero counts"),
        }

        let metrics = self
            .instruments
            .iter()
            .map(|inst| {
                let point = points
                    .iter()
                    .position(|(name, _)| name == inst.name())
                    .map(|i| points.swap_remove(i).1)
                    .unwrap_or_else(|| HistogramPoint::empty(inst.strategy()));
                MetricData::new(inst.name(), inst.unit(), point)
            })
            .collect();

        ExportBatch {
            sequence,
            resource: self.resource.clone(),
            window_start,
            window_end: now,
            metrics,
            reference: self
                .references
                .iter()
                .map(|r| ReferenceWindow {
                    unit: r.unit(),
                    exact: r.collect(),
                })
                .collect(),
        }
    }

    /// Push pending windows through every periodic reader.
    pub fn force_flush(&self) -> Result<()> {
        self.provider.force_flush()?;
        Ok(())
    }

    /// Final export on every periodic reader. Periodic readers block on
    /// their export task, so call this off the async worker threads.
    pub fn shutdown(&self) -> Result<()> {
        self.provider.shutdown()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::data::Buckets;
    use crate::metrics::strategy::BucketStrategy;
    use opentelemetry_sdk::metrics::data::{ExponentialHistogram, Histogram};
    use opentelemetry_sdk::runtime;
    use opentelemetry_sdk::testing::metrics::InMemoryMetricsExporter;
    use std::time::Duration;

    #[test]
    fn registers_four_instruments() {
        let registry = MeterRegistry::new(&WorkloadConfig::default());
        let names: Vec<&str> = registry.instruments().iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["exponential-ms", "explicit-ms", "exponential-ns", "explicit-ns"]);

        let ns = registry.instrument("exponential-ns").unwrap();
        assert_eq!(ns.unit(), Unit::Nanoseconds);
        assert_eq!(ns.strategy(), &BucketStrategy::Exponential { max_size: 160 });
        assert!(registry.instrument("nope").is_none());
    }

    #[test]
    fn idle_window_exports_zero_counts() {
        let registry = MeterRegistry::new(&WorkloadConfig::default());
        let batch = registry.collect();
        assert_eq!(batch.sequence, 0);
        assert_eq!(batch.metrics.len(), 4);
        assert!(batch.metrics.iter().all(|m| m.point.count == 0));
        assert!(batch.reference.iter().all(|r| !r.exact.has_data()));
        assert_eq!(registry.collect().sequence, 1);
    }

    #[test]
    fn sdk_buckets_follow_the_strategy() {
        let registry = MeterRegistry::new(&WorkloadConfig::default());
        for name in ["exponential-ms", "explicit-ms"] {
            let inst = registry.instrument(name).unwrap();
            inst.record(3);
            inst.record(7);
        }

        let batch = registry.collect();
        let explicit = &batch.metric("explicit-ms").unwrap().point;
        assert_eq!((explicit.count, explicit.sum), (2, 10));
        assert_eq!((explicit.min, explicit.max), (Some(3), Some(7)));
        let Buckets::Explicit { counts, .. } = &explicit.buckets else {
            panic!("explicit-ms should be explicit");
        };
        // 3 in (0, 5], 7 in (5, 10]
        assert_eq!(&counts[..3], &[0, 1, 1]);

        let exponential = &batch.metric("exponential-ms").unwrap().point;
        let Buckets::Exponential { counts, scale, .. } = &exponential.buckets else {
            panic!("exponential-ms should be exponential");
        };
        assert_eq!(counts.iter().sum::<u64>(), 2);
        assert!(counts.len() <= 160);
        assert!(*scale <= 20);
    }

    #[test]
    fn collect_is_delta() {
        let registry = MeterRegistry::new(&WorkloadConfig::default());
        let inst = registry.instrument("exponential-ns").unwrap();
        inst.record(3_000_000);
        assert_eq!(registry.collect().metric("exponential-ns").unwrap().point.count, 1);

        let second = registry.collect();
        let point = &second.metric("exponential-ns").unwrap().point;
        assert_eq!(point.count, 0);
        assert!(matches!(point.buckets, Buckets::Exponential { .. }));
    }

    #[test]
    fn explicit_ns_overflow_bucket_takes_large_values() {
        let registry = MeterRegistry::new(&WorkloadConfig::default());
        let explicit_ns = registry.instrument("explicit-ns").unwrap();
        explicit_ns.record(999_999_999);
        explicit_ns.record(1_000_000_000);

        let batch = registry.collect();
        let Buckets::Explicit { counts, .. } = &batch.metric("explicit-ns").unwrap().point.buckets else {
            panic!("explicit-ns should be explicit");
        };
        assert_eq!(counts.len(), 11);
        assert_eq!(counts[10], 2);
        assert_eq!(counts.iter().sum::<u64>(), 2);
    }

    #[test]
    fn exponential_downscales_within_max_size() {
        let registry = MeterRegistry::new(&WorkloadConfig::default());
        let inst = registry.instrument("exponential-ns").unwrap();
        for ms in 1..=1_000 {
            inst.record(ms * 1_000_000);
        }
        let batch = registry.collect();
        let Buckets::Exponential { counts, scale, .. } = &batch.metric("exponential-ns").unwrap().point.buckets
        else {
            panic!("exponential-ns should be exponential");
        };
        assert!(counts.len() <= 160);
        assert!(*scale < 20);
        assert_eq!(counts.iter().sum::<u64>(), 1_000);
    }

    #[test]
    fn concurrent_record_and_collect_lose_nothing() {
        let registry = MeterRegistry::new(&WorkloadConfig::default());
        let inst = registry.instrument("explicit-ms").unwrap();

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let inst = inst.clone();
                std::thread::spawn(move || {
                    for i in 0..10_000 {
                        inst.record(1 + (i + t) % 200);
                    }
                })
            })
            .collect();

        let mut drained = 0;
        for _ in 0..50 {
            drained += registry.collect().metric("explicit-ms").unwrap().point.count;
        }
        for w in writers {
            w.join().unwrap();
        }
        drained += registry.collect().metric("explicit-ms").unwrap().point.count;
        assert_eq!(drained, 40_000);
    }

    #[test]
    fn windows_are_contiguous() {
        let registry = MeterRegistry::new(&WorkloadConfig::default());
        let a = registry.collect();
        let b = registry.collect();
        assert_eq!(a.window_end, b.window_start);
        assert_eq!(a.resource.instance_id, b.resource.instance_id);
    }

    // The periodic reader's flush blocks on its export task, which needs a
    // worker thread other than the test's own.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn periodic_readers_get_the_same_views() {
        let exporter = InMemoryMetricsExporter::default();
        let reader = PeriodicReader::builder(exporter.clone(), runtime::Tokio)
            .with_interval(Duration::from_secs(3_600))
            .build();
        let registry = MeterRegistry::with_readers(&WorkloadConfig::default(), vec![reader]);
        registry.instrument("exponential-ns").unwrap().record(3_000_000);
        registry.instrument("explicit-ns").unwrap().record(3_000_000);
        registry.force_flush().unwrap();

        let finished = exporter.get_finished_metrics().unwrap();
        let metrics: Vec<_> = finished
            .iter()
            .flat_map(|rm| rm.scope_metrics.iter())
            .flat_map(|sm| sm.metrics.iter())
            .collect();

        let exponential = metrics.iter().find(|m| m.name == "exponential-ns").unwrap();
        assert!(exponential
            .data
            .as_any()
            .downcast_ref::<ExponentialHistogram<u64>>()
            .is_some());

        let explicit = metrics.iter().find(|m| m.name == "explicit-ns").unwrap();
        let hist = explicit.data.as_any().downcast_ref::<Histogram<u64>>().unwrap();
        assert_eq!(hist.data_points[0].bucket_counts[10], 1);
        assert_eq!(explicit.unit, "ns");

        // The window reader keeps its own delta state
        let batch = registry.collect();
        assert_eq!(batch.metric("explicit-ns").unwrap().point.count, 1);
        registry.shutdown().unwrap();
    }
}
