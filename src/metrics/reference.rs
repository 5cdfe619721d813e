use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

use super::estimate::QUANTILES;
use super::strategy::Unit;

const SIGFIG: u8 = 3;
/// Largest trackable value: one hour, in the recorder's unit.
const HOUR_MS: u64 = 3_600_000;

/// Exact quantiles of one window, the yardstick for bucket estimates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExactQuantiles {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    /// In `QUANTILES` order
    pub values: [u64; 4],
}

impl ExactQuantiles {
    pub fn has_data(&self) -> bool {
        self.count > 0
    }

    pub fn as_f64(&self) -> [f64; 4] {
        self.values.map(|v| v as f64)
    }
}

/// HdrHistogram shadow of one unit scale, drained with every export window.
pub struct ReferenceRecorder {
    unit: Unit,
    hist: Mutex<Histogram<u64>>,
}

impl ReferenceRecorder {
    pub fn new(unit: Unit) -> Self {
        let high = HOUR_MS * unit.per_millisecond() as u64;
        // bounds are constants well inside the supported range
        let hist = Histogram::<u64>::new_with_bounds(1, high, SIGFIG)
            .expect("reference histogram bounds");
        Self {
            unit,
            hist: Mutex::new(hist),
        }
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Values outside `1..=1h` are clamped onto the edge.
    pub fn record(&self, value: i64) {
        let v = value.max(1) as u64;
        self.hist.lock().saturating_record(v);
    }

    pub fn collect(&self) -> ExactQuantiles {
        let mut hist = self.hist.lock();
        let exact = if hist.len() == 0 {
            ExactQuantiles::default()
        } else {
            ExactQuantiles {
                count: hist.len(),
                min: hist.min(),
                max: hist.max(),
                values: QUANTILES.map(|(_, q)| hist.value_at_quantile(q)),
            }
        };
        hist.reset();
        exact
    }
}
