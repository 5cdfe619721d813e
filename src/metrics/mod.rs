//! Histogram instruments on the OpenTelemetry SDK: bucket strategy views,
//! the pull reader the export scheduler drains, and the exact reference
//! each window is compared against.

pub mod data;
pub mod estimate;
pub mod instrument;
pub mod reader;
pub mod reference;
pub mod registry;
pub mod strategy;

pub use data::{Buckets, ExportBatch, HistogramPoint, MetricData};
pub use estimate::PercentileEstimate;
pub use instrument::HistogramInstrument;
pub use reader::WindowReader;
pub use reference::ExactQuantiles;
pub use registry::MeterRegistry;
pub use strategy::{select_strategy, strategy_view, BucketStrategy, Unit, EXPONENTIAL_MARKER, INSTRUMENTS};
