use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::metrics::ExportBatch;

/// How many batches the live view keeps around.
pub const DEFAULT_CAPACITY: usize = 60;

/// Bounded in-process ring of recent batches. Clones share the buffer, so
/// one clone can sit in the scheduler while another serves readers.
#[derive(Clone)]
pub struct MemoryExporter {
    batches: Arc<Mutex<VecDeque<ExportBatch>>>,
    capacity: usize,
}

impl MemoryExporter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            batches: Arc::new(Mutex::new(VecDeque::with_capacity(capacity + 1))),
            capacity,
        }
    }

    pub fn export(&self, batch: &ExportBatch) {
        let mut batches = self.batches.lock();
        batches.push_back(batch.clone());
        if batches.len() > self.capacity {
            batches.pop_front();
        }
    }

    /// Oldest first.
    pub fn batches(&self) -> Vec<ExportBatch> {
        self.batches.lock().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<ExportBatch> {
        self.batches.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryExporter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
