use std::fmt;

use serde::Serialize;

use crate::metrics::estimate::{relative_error, QUANTILES};
use crate::metrics::{Buckets, ExportBatch, MetricData, Unit};

/// Running comparison of the two strategies, folded from delta batches.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComparisonReport {
    /// The mixture that produced the samples, one component per clause
    pub workload: String,
    pub windows: u64,
    pub instruments: Vec<InstrumentReport>,
}

/// Cost and fidelity of one instrument across all observed windows.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentReport {
    pub name: String,
    pub unit: Unit,
    pub strategy: &'static str,
    pub count: u64,
    pub windows_with_data: u64,
    /// Most bucket counters any single window needed
    pub max_buckets: usize,
    /// Serialized size of every exported point, summed
    pub exported_bytes: u64,
    /// Share of values that fell past the last explicit boundary
    pub overflow_share: f64,
    /// Count-weighted mean relative error per quantile vs. the exact reference
    pub quantile_error: Vec<QuantileError>,
    #[serde(skip)]
    overflow: u64,
    #[serde(skip)]
    weighted_error: [f64; 4],
    #[serde(skip)]
    error_weight: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuantileError {
    pub quantile: &'static str,
    pub mean_relative_error: f64,
}

impl InstrumentReport {
    fn new(metric: &MetricData) -> Self {
        let strategy = match metric.point.buckets {
            Buckets::Explicit { .. } => "explicit",
            Buckets::Exponential { .. } => "exponential",
        };
        Self {
            name: metric.name.clone(),
            unit: metric.unit,
            strategy,
            count: 0,
            windows_with_data: 0,
            max_buckets: 0,
            exported_bytes: 0,
            overflow_share: 0.0,
            quantile_error: Vec::new(),
            overflow: 0,
            weighted_error: [0.0; 4],
            error_weight: 0,
        }
    }

    fn observe(&mut self, metric: &MetricData, reference: Option<[f64; 4]>) {
        let point = &metric.point;
        self.exported_bytes += serde_json::to_vec(metric).map(|v| v.len() as u64).unwrap_or(0);
        self.max_buckets = self.max_buckets.max(point.buckets.len());
        if point.count == 0 {
            return;
        }

        self.count += point.count;
        self.windows_with_data += 1;
        if let Buckets::Explicit { counts, .. } = &point.buckets {
            self.overflow += counts.last().copied().unwrap_or(0);
        }
        self.overflow_share = self.overflow as f64 / self.count as f64;

        if let Some(exact) = reference {
            let estimated = metric.estimate.quantiles();
            for i in 0..4 {
                self.weighted_error[i] += relative_error(estimated[i], exact[i]) * point.count as f64;
            }
            self.error_weight += point.count;
        }
        self.quantile_error = QUANTILES
            .iter()
            .enumerate()
            .map(|(i, &(quantile, _))| QuantileError {
                quantile,
                mean_relative_error: if self.error_weight == 0 {
                    0.0
                } else {
                    self.weighted_error[i] / self.error_weight as f64
                },
            })
            .collect();
    }

    pub fn error_for(&self, quantile: &str) -> Option<f64> {
        self.quantile_error
            .iter()
            .find(|e| e.quantile == quantile)
            .map(|e| e.mean_relative_error)
    }
}

impl ComparisonReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_workload(workload: impl Into<String>) -> Self {
        Self {
            workload: workload.into(),
            ..Self::default()
        }
    }

    pub fn observe(&mut self, batch: &ExportBatch) {
        self.windows += 1;
        for metric in &batch.metrics {
            let reference = batch
                .reference_for(metric.unit)
                .filter(|r| r.has_data())
                .map(|r| r.as_f64());

            let idx = match self.instruments.iter().position(|r| r.name == metric.name) {
                Some(i) => i,
                None => {
                    self.instruments.push(InstrumentReport::new(metric));
                    self.instruments.len() - 1
                }
            };
            self.instruments[idx].observe(metric, reference);
        }
    }

    pub fn instrument(&self, name: &str) -> Option<&InstrumentReport> {
        self.instruments.iter().find(|r| r.name == name)
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.workload.is_empty() {
            writeln!(f, "workload: {}", self.workload)?;
        }
        writeln!(f, "windows exported: {}", self.windows)?;
        writeln!(
            f,
            "{:<16} {:>10} {:>8} {:>11} {:>9} {:>8} {:>8} {:>8} {:>8}",
            "instrument", "count", "buckets", "bytes", "overflow", "p50 err", "p95 err", "p99 err", "p999 err"
        )?;
        for r in &self.instruments {
            let err = |q| r.error_for(q).unwrap_or(0.0) * 100.0;
            writeln!(
                f,
                "{:<16} {:>10} {:>8} {:>11} {:>8.1}% {:>7.2}% {:>7.2}% {:>7.2}% {:>7.2}%",
                r.name,
                r.count,
                r.max_buckets,
                r.exported_bytes,
                r.overflow_share * 100.0,
                err("p50"),
                err("p95"),
                err("p99"),
                err("p999"),
            )?;
        }
        Ok(())
    }
}
