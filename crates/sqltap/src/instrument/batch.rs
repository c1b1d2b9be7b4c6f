use crate::record::QueryRecord;
use std::sync::Mutex;

/// Pending-batch accumulator, owned exclusively by one statement-like
/// wrapper.
///
/// Starts empty; successful batch-adds append in call order; `clear` empties
/// unconditionally; `take` snapshots and empties in one step so the batch is
/// consumed exactly once per execute attempt. Mutex-guarded because a shared
/// wrapper may see concurrent batch-adds; the lock is never held across an
/// `await`.
#[derive(Debug, Default)]
pub(crate) struct BatchState {
    pending: Mutex<Vec<QueryRecord>>,
}

impl BatchState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a query in call order.
    pub(crate) fn append(&self, query: QueryRecord) {
        self.pending.lock().unwrap().push(query);
    }

    /// Snapshot the pending queries and leave the batch empty.
    pub(crate) fn take(&self) -> Vec<QueryRecord> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }

    /// Empty the batch. Idempotent.
    pub(crate) fn clear(&self) {
        self.pending.lock().unwrap().clear();
    }

    /// Copy of the pending queries, in insertion order.
    pub(crate) fn snapshot(&self) -> Vec<QueryRecord> {
        self.pending.lock().unwrap().clone()
    }
}
