use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use super::AppState;
use crate::metrics::ExportBatch;
use crate::report::ComparisonReport;

// ─── GET /api/windows ────────────────────────────────────────────
/// Every export window still held in memory, oldest first.

pub async fn get_windows(State(state): State<Arc<AppState>>) -> Json<Vec<ExportBatch>> {
    Json(state.windows.batches())
}

// ─── GET /api/windows/latest ─────────────────────────────────────

pub async fn get_latest(State(state): State<Arc<AppState>>) -> Json<Option<ExportBatch>> {
    Json(state.windows.latest())
}

// ─── GET /api/report ─────────────────────────────────────────────

pub async fn get_report(State(state): State<Arc<AppState>>) -> Json<ComparisonReport> {
    Json(state.report.lock().clone())
}

// ─── GET /api/windows/stream ─────────────────────────────────────
/// Server-Sent Events: the newest window as JSON every 500 ms. Ticks that
/// arrive before the first export send nothing.

pub async fn windows_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(Duration::from_millis(500));

    let stream = IntervalStream::new(interval).filter_map(move |_| {
        let batch = state.windows.latest()?;
        let json = serde_json::to_string(&batch).unwrap_or_default();
        Some(Ok(Event::default().id(batch.sequence.to_string()).data(json)))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkloadConfig;
    use crate::export::MemoryExporter;
    use crate::metrics::MeterRegistry;
    use parking_lot::Mutex;

    fn state() -> (MeterRegistry, Arc<AppState>) {
        let registry = MeterRegistry::new(&WorkloadConfig::default());
        let state = Arc::new(AppState {
            windows: MemoryExporter::new(4),
            report: Arc::new(Mutex::new(ComparisonReport::new())),
        });
        (registry, state)
    }

    #[tokio::test]
    async fn windows_handler_lists_batches() {
        let (registry, state) = state();
        state.windows.export(&registry.collect());
        state.windows.export(&registry.collect());

        let Json(batches) = get_windows(State(state.clone())).await;
        assert_eq!(batches.len(), 2);
        let Json(latest) = get_latest(State(state)).await;
        assert_eq!(latest.unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn report_handler_snapshots() {
        let (registry, state) = state();
        state.report.lock().observe(&registry.collect());
        let Json(report) = get_report(State(state)).await;
        assert_eq!(report.windows, 1);
    }
}
