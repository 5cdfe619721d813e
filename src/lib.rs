//! Synthetic latency workload recorded into explicit- and exponential-bucket
//! histograms at millisecond and nanosecond scale, exported as periodic
//! delta windows so the two bucketing strategies can be compared.

pub mod app;
pub mod config;
pub mod error;
pub mod export;
pub mod generator;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod server;

pub use config::WorkloadConfig;
pub use error::{Error, Result};
