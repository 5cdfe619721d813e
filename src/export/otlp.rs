use std::time::Duration;

use opentelemetry_otlp::{MetricsExporter, MetricsExporterBuilder, WithExportConfig};
use opentelemetry_sdk::metrics::reader::DeltaTemporalitySelector;
use opentelemetry_sdk::metrics::PeriodicReader;
use opentelemetry_sdk::runtime;

use crate::error::Result;

/// OTLP/gRPC port on the local collector.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:4317";

/// Ships the four histograms to an OpenTelemetry collector as delta
/// OTLP metrics. Unlike the batch exporters it is a meter provider
/// reader with its own timer, so it sees SDK data points directly.
pub struct OtlpCollector {
    endpoint: String,
    exporter: MetricsExporter,
}

impl OtlpCollector {
    /// The gRPC channel connects lazily; an unreachable collector shows
    /// up as failed exports, not here. Needs a tokio runtime.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let exporter = MetricsExporterBuilder::from(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint.clone()),
        )
        .build_metrics_exporter(Box::new(DeltaTemporalitySelector::new()))?;
        Ok(Self { endpoint, exporter })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn into_reader(self, interval: Duration) -> PeriodicReader {
        tracing::info!(endpoint = %self.endpoint, interval_ms = interval.as_millis() as u64, "OTLP export enabled");
        PeriodicReader::builder(self.exporter, runtime::Tokio)
            .with_interval(interval)
            .build()
    }
}
