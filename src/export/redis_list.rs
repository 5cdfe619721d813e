use redis::aio::ConnectionManager;

use crate::error::Result;
use crate::metrics::ExportBatch;

/// Longest list kept under the export key unless configured otherwise.
pub const DEFAULT_MAX_LEN: usize = 1_000;

/// Opens a `ConnectionManager` that reconnects on its own.
///
/// `ConnectionManager` is cheaply cloneable; every clone shares the same
/// multiplexed connection.
pub async fn connect(url: &str) -> Result<ConnectionManager> {
    let client = redis::Client::open(url)?;
    let conn = ConnectionManager::new(client).await?;
    Ok(conn)
}

/// Pushes each batch as JSON onto a Redis list and trims the list so a
/// collector that falls behind never grows it without bound.
pub struct RedisExporter {
    conn: ConnectionManager,
    key: String,
    max_len: usize,
}

impl RedisExporter {
    pub fn new(conn: ConnectionManager, key: impl Into<String>, max_len: usize) -> Self {
        Self {
            conn,
            key: key.into(),
            max_len: max_len.max(1),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn export(&mut self, batch: &ExportBatch) -> Result<()> {
        let json = serde_json::to_string(batch)?;

        let result: redis::RedisResult<()> = redis::pipe()
            .cmd("RPUSH")
            .arg(&self.key)
            .arg(json)
            .ignore()
            .cmd("LTRIM")
            .arg(&self.key)
            .arg(-(self.max_len as i64))
            .arg(-1)
            .ignore()
            .query_async(&mut self.conn)
            .await;
        result?;
        Ok(())
    }
}
