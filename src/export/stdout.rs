use tokio::io::{AsyncWriteExt, Stdout};

use crate::error::Result;
use crate::metrics::ExportBatch;

/// Writes one JSON document per batch to standard output.
pub struct StdoutExporter {
    out: Stdout,
}

impl StdoutExporter {
    pub fn new() -> Self {
        Self {
            out: tokio::io::stdout(),
        }
    }

    pub async fn export(&mut self, batch: &ExportBatch) -> Result<()> {
        let mut line = serde_json::to_vec(batch)?;
        line.push(b'\n');
        self.out.write_all(&line).await?;
        self.out.flush().await?;
        Ok(())
    }
}

impl Default for StdoutExporter {
    fn default() -> Self {
        Self::new()
    }
}
