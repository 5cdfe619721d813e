use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::generator::{to_nanoseconds, MixtureGenerator};
use crate::metrics::{HistogramInstrument, MeterRegistry, Unit};

// ─── Public types ────────────────────────────────────────────────

/// Fans each generated measurement out to the four instruments.
pub struct RecordingPipeline {
    registry: Arc<MeterRegistry>,
    exponential_ms: Arc<HistogramInstrument>,
    explicit_ms: Arc<HistogramInstrument>,
    exponential_ns: Arc<HistogramInstrument>,
    explicit_ns: Arc<HistogramInstrument>,
}

/// What the generation loop did, for the final report.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub iterations: u64,
    pub elapsed_secs: f64,
    pub samples_per_sec: f64,
    pub min_ms: i64,
    pub max_ms: i64,
    /// Draws per mixture component, in configuration order
    pub components: Vec<ComponentTally>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentTally {
    pub name: String,
    pub draws: u64,
    pub share: f64,
}

// ─── Pipeline impl ───────────────────────────────────────────────

impl RecordingPipeline {
    pub fn new(registry: Arc<MeterRegistry>) -> Result<Self> {
        let lookup = |name: &str| {
            registry
                .instrument(name)
                .ok_or_else(|| Error::config(format!("instrument \"{name}\" is not registered")))
        };
        Ok(Self {
            exponential_ms: lookup("exponential-ms")?,
            explicit_ms: lookup("explicit-ms")?,
            exponential_ns: lookup("exponential-ns")?,
            explicit_ns: lookup("explicit-ns")?,
            registry,
        })
    }

    /// Record one millisecond measurement and its nanosecond twin.
    pub fn record(&self, ms: i64) -> (i64, i64) {
        let ns = to_nanoseconds(ms);

        self.exponential_ms.record(ms);
        self.explicit_ms.record(ms);
        self.exponential_ns.record(ns);
        self.explicit_ns.record(ns);

        self.registry.record_reference(Unit::Milliseconds, ms);
        self.registry.record_reference(Unit::Nanoseconds, ns);
        (ms, ns)
    }

    /// Synchronous generation loop: no suspension points, no cancellation.
    pub fn run<R: Rng>(&self, generator: &mut MixtureGenerator<R>, iterations: u64) -> RunSummary {
        let start = Instant::now();
        let progress_every = (iterations / 10).max(1);
        let mut draws = vec![0u64; generator.component_count()];
        let mut min_ms = i64::MAX;
        let mut max_ms = i64::MIN;

        for i in 0..iterations {
            let draw = generator.draw();
            draws[draw.component] += 1;
            min_ms = min_ms.min(draw.ms);
            max_ms = max_ms.max(draw.ms);
            self.record(draw.ms);

            if (i + 1) % progress_every == 0 {
                tracing::debug!(done = i + 1, total = iterations, "generation progress");
            }
        }

        let elapsed = start.elapsed();
        let components = draws
            .iter()
            .enumerate()
            .map(|(c, &n)| ComponentTally {
                name: generator.component_name(c).to_owned(),
                draws: n,
                share: if iterations == 0 { 0.0 } else { n as f64 / iterations as f64 },
            })
            .collect();

        RunSummary {
            iterations,
            elapsed_secs: elapsed.as_secs_f64(),
            samples_per_sec: rate(iterations, elapsed),
            min_ms: if iterations == 0 { 0 } else { min_ms },
            max_ms: if iterations == 0 { 0 } else { max_ms },
            components,
        }
    }
}

fn rate(n: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        n as f64 / secs
    } else {
        0.0
    }
}
