use opentelemetry::metrics::{Histogram, Meter};

use super::strategy::{BucketStrategy, Unit};

/// One of the four SDK histograms plus the strategy its view assigned.
/// Recording is lock-free on the caller's side; the SDK synchronises
/// `record` against the reader draining the window.
pub struct HistogramInstrument {
    name: &'static str,
    unit: Unit,
    strategy: BucketStrategy,
    histogram: Histogram<u64>,
}

impl HistogramInstrument {
    pub fn new(meter: &Meter, name: &'static str, unit: Unit, strategy: BucketStrategy) -> Self {
        let histogram = meter
            .u64_histogram(name)
            .with_unit(unit.symbol())
            .with_description(format!("synthetic latency, {} buckets", strategy_label(&strategy)))
            .init();
        Self {
            name,
            unit,
            strategy,
            histogram,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn strategy(&self) -> &BucketStrategy {
        &self.strategy
    }

    /// Measurements are at least 1; anything below 0 is recorded as 0.
    pub fn record(&self, value: i64) {
        self.histogram.record(u64::try_from(value).unwrap_or(0), &[]);
    }
}

fn strategy_label(strategy: &BucketStrategy) -> &'static str {
    if strategy.is_exponential() {
        "base-2 exponential"
    } else {
        "explicit"
    }
}
