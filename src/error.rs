use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Workload descriptor failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// A sampler could not be built from its parameters.
    #[error("invalid {family} parameters: {reason}")]
    Distribution { family: &'static str, reason: String },

    /// An exporter refused or failed to ship a batch.
    #[error("export via {exporter} failed: {reason}")]
    Export { exporter: &'static str, reason: String },

    /// The OpenTelemetry SDK or its OTLP transport reported a failure.
    #[error("telemetry: {0}")]
    Metrics(#[from] opentelemetry::metrics::MetricsError),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("generation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
