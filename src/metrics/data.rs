use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::data::{self as sdk, Metric};
use serde::Serialize;
use uuid::Uuid;

use super::estimate::PercentileEstimate;
use super::reference::ExactQuantiles;
use super::strategy::{BucketStrategy, Unit, MAX_EXPONENTIAL_SCALE};

/// How counts relate across windows. Only delta is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Temporality {
    Delta,
}

/// Bucket layout of one exported data point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Buckets {
    Explicit {
        bounds: Vec<f64>,
        counts: Vec<u64>,
    },
    Exponential {
        scale: i32,
        zero_count: u64,
        offset: i32,
        counts: Vec<u64>,
    },
}

impl Buckets {
    /// Number of bucket counters carried on the wire.
    pub fn len(&self) -> usize {
        match self {
            Self::Explicit { counts, .. } => counts.len(),
            Self::Exponential { counts, .. } => counts.len() + 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Aggregated state of one instrument over one export window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramPoint {
    pub count: u64,
    pub sum: i64,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub buckets: Buckets,
}

impl HistogramPoint {
    /// What an instrument exports for a window with no measurements.
    pub fn empty(strategy: &BucketStrategy) -> Self {
        let buckets = match strategy {
            BucketStrategy::Explicit { boundaries } => Buckets::Explicit {
                bounds: boundaries.clone(),
                counts: vec![0; boundaries.len() + 1],
            },
            BucketStrategy::Exponential { .. } => Buckets::Exponential {
                scale: i32::from(MAX_EXPONENTIAL_SCALE),
                zero_count: 0,
                offset: 0,
                counts: Vec::new(),
            },
        };
        Self {
            count: 0,
            sum: 0,
            min: None,
            max: None,
            buckets,
        }
    }

    /// Read the single data point of an SDK histogram metric. `None` when
    /// the metric is not a `u64` histogram or carries no point.
    pub fn from_sdk(metric: &Metric) -> Option<Self> {
        let data = metric.data.as_any();
        if let Some(hist) = data.downcast_ref::<sdk::Histogram<u64>>() {
            let p = hist.data_points.first()?;
            return Some(Self {
                count: p.count,
                sum: clamp_i64(p.sum),
                min: p.min.map(clamp_i64),
                max: p.max.map(clamp_i64),
                buckets: Buckets::Explicit {
                    bounds: p.bounds.clone(),
                    counts: p.bucket_counts.clone(),
                },
            });
        }
        if let Some(hist) = data.downcast_ref::<sdk::ExponentialHistogram<u64>>() {
            let p = hist.data_points.first()?;
            return Some(Self {
                count: p.count as u64,
                sum: clamp_i64(p.sum),
                min: p.min.map(clamp_i64),
                max: p.max.map(clamp_i64),
                buckets: Buckets::Exponential {
                    scale: i32::from(p.scale),
                    zero_count: p.zero_count,
                    offset: p.positive_bucket.offset,
                    counts: p.positive_bucket.counts.clone(),
                },
            });
        }
        None
    }
}

fn clamp_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricData {
    pub name: String,
    pub unit: Unit,
    pub temporality: Temporality,
    pub point: HistogramPoint,
    /// Quantiles reconstructed from the buckets alone
    pub estimate: PercentileEstimate,
}

impl MetricData {
    pub fn new(name: impl Into<String>, unit: Unit, point: HistogramPoint) -> Self {
        let estimate = PercentileEstimate::from_point(&point);
        Self {
            name: name.into(),
            unit,
            temporality: Temporality::Delta,
            point,
            estimate,
        }
    }
}

/// Exact quantiles for one unit scale over the same window.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceWindow {
    pub unit: Unit,
    pub exact: ExactQuantiles,
}

/// Identity of the process producing the batches.
#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub service_name: String,
    pub instance_id: Uuid,
}

impl Resource {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            instance_id: Uuid::new_v4(),
        }
    }

    /// Same identity as OpenTelemetry resource attributes, so the OTLP
    /// stream and the JSON batches can be joined on it.
    pub fn to_sdk(&self) -> opentelemetry_sdk::Resource {
        opentelemetry_sdk::Resource::new([
            KeyValue::new("service.name", self.service_name.clone()),
            KeyValue::new("service.instance.id", self.instance_id.to_string()),
        ])
    }
}

/// Everything shipped on one export tick.
#[derive(Debug, Clone, Serialize)]
pub struct ExportBatch {
    pub sequence: u64,
    pub resource: Resource,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub metrics: Vec<MetricData>,
    pub reference: Vec<ReferenceWindow>,
}

impl ExportBatch {
    pub fn metric(&self, name: &str) -> Option<&MetricData> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn reference_for(&self, unit: Unit) -> Option<&ExactQuantiles> {
        self.reference
            .iter()
            .find(|r| r.unit == unit)
            .map(|r| &r.exact)
    }

    pub fn total_count(&self) -> u64 {
        self.metrics.iter().map(|m| m.point.count).sum()
    }
}
