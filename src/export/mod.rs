//! Export transports and the periodic delta-export scheduler.

pub mod memory;
pub mod otlp;
pub mod redis_list;
pub mod scheduler;
pub mod stdout;

pub use memory::MemoryExporter;
pub use otlp::OtlpCollector;
pub use redis_list::RedisExporter;
pub use scheduler::{ExportHandle, ExportScheduler, ExportStats};
pub use stdout::StdoutExporter;

use crate::error::{Error, Result};
use crate::metrics::ExportBatch;

/// A destination for export batches.
pub enum Exporter {
    Stdout(StdoutExporter),
    Redis(RedisExporter),
    Memory(MemoryExporter),
    #[cfg(test)]
    Failing,
    /// Succeeds after stalling for the given time
    #[cfg(test)]
    Slow(std::time::Duration),
}

impl Exporter {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stdout(_) => "stdout",
            Self::Redis(_) => "redis",
            Self::Memory(_) => "memory",
            #[cfg(test)]
            Self::Failing => "failing",
            #[cfg(test)]
            Self::Slow(_) => "slow",
        }
    }

    pub async fn export(&mut self, batch: &ExportBatch) -> Result<()> {
        let name = self.name();
        let result = match self {
            Self::Stdout(e) => e.export(batch).await,
            Self::Redis(e) => e.export(batch).await,
            Self::Memory(e) => {
                e.export(batch);
                Ok(())
            }
            #[cfg(test)]
            Self::Failing => Err(Error::Export {
                exporter: name,
                reason: "collector unreachable".into(),
            }),
            #[cfg(test)]
            Self::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
        };
        result.map_err(|e| match e {
            e @ Error::Export { .. } => e,
            other => Error::Export {
                exporter: name,
                reason: other.to_string(),
            },
        })
    }
}
