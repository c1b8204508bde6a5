use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use outbox_relay::{InMemoryOutboxStore, OutboxEvent, OutboxStore, StoreError};

/// In-memory store that records every mark-sent chunk and can be told to
/// fail reads or a specific mark-sent call.
#[derive(Clone, Default)]
pub struct RecordingStore {
    pub inner: InMemoryOutboxStore,
    chunks: Arc<Mutex<Vec<Vec<i64>>>>,
    fail_fetch: Arc<AtomicBool>,
    fail_mark_call: Arc<Mutex<Option<usize>>>,
    mark_calls: Arc<AtomicUsize>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Fail the `call`-th mark-sent call (1-based, counted across runs).
    pub fn fail_mark_call(&self, call: Option<usize>) {
        *self.fail_mark_call.lock().unwrap() = call;
    }

    /// Ids of each successful mark-sent call, in call order.
    pub fn chunks(&self) -> Vec<Vec<i64>> {
        self.chunks.lock().unwrap().clone()
    }

    pub fn mark_calls(&self) -> usize {
        self.mark_calls.load(Ordering::SeqCst)
    }
}

impl OutboxStore for RecordingStore {
    fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxEvent>, StoreError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("database is down".to_string()));
        }
        self.inner.fetch_pending(limit)
    }

    fn mark_sent(&self, ids: &[i64], sent_at: DateTime<Utc>) -> Result<usize, StoreError> {
        let call = self.mark_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_mark_call.lock().unwrap() == Some(call) {
            return Err(StoreError::Unavailable("statement timeout".to_string()));
        }
        let updated = self.inner.mark_sent(ids, sent_at)?;
        self.chunks.lock().unwrap().push(ids.to_vec());
        Ok(updated)
    }
}
