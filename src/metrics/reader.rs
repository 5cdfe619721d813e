use std::sync::{Arc, Weak};

use opentelemetry::metrics::Result as MetricsResult;
use opentelemetry_sdk::metrics::data::{ResourceMetrics, Temporality};
use opentelemetry_sdk::metrics::reader::{DeltaTemporalitySelector, MetricReader, TemporalitySelector};
use opentelemetry_sdk::metrics::{InstrumentKind, ManualReader, Pipeline};
use opentelemetry_sdk::Resource;

/// Pull-based delta reader. One clone is registered with the meter
/// provider; the export scheduler drains through another, on its own timer,
/// so every tick yields a window even when nothing was recorded.
#[derive(Debug, Clone)]
pub struct WindowReader {
    inner: Arc<ManualReader>,
}

impl WindowReader {
    pub fn new() -> Self {
        let reader = ManualReader::builder()
            .with_temporality_selector(DeltaTemporalitySelector::new())
            .build();
        Self {
            inner: Arc::new(reader),
        }
    }

    /// Everything recorded since the previous drain. Instruments without
    /// measurements in the window carry no data point.
    pub fn drain(&self) -> MetricsResult<ResourceMetrics> {
        let mut rm = ResourceMetrics {
            resource: Resource::empty(),
            scope_metrics: Vec::new(),
        };
        self.inner.collect(&mut rm)?;
        Ok(rm)
    }
}

impl Default for WindowReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TemporalitySelector for WindowReader {
    fn temporality(&self, kind: InstrumentKind) -> Temporality {
        self.inner.temporality(kind)
    }
}

impl MetricReader for WindowReader {
    fn register_pipeline(&self, pipeline: Weak<Pipeline>) {
        self.inner.register_pipeline(pipeline)
    }

    fn collect(&self, rm: &mut ResourceMetrics) -> MetricsResult<()> {
        self.inner.collect(rm)
    }

    fn force_flush(&self) -> MetricsResult<()> {
        self.inner.force_flush()
    }

    fn shutdown(&self) -> MetricsResult<()> {
        self.inner.shutdown()
    }
}
