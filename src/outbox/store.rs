use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::error::StoreError;

use super::record::{NewOutboxEvent, OutboxEvent, OutboxStatus};

/// Durable outbox table as seen by the dispatch job.
pub trait OutboxStore: Send + Sync {
    /// Return at most `limit` pending rows, ascending by id.
    fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxEvent>, StoreError>;

    /// Flip the given rows to `Sent` in a single atomic statement.
    ///
    /// Returns the number of rows that changed state. Rows that are already
    /// sent (or unknown) are left untouched.
    fn mark_sent(&self, ids: &[i64], sent_at: DateTime<Utc>) -> Result<usize, StoreError>;
}

impl<S: OutboxStore + ?Sized> OutboxStore for Arc<S> {
    fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxEvent>, StoreError> {
        (**self).fetch_pending(limit)
    }

    fn mark_sent(&self, ids: &[i64], sent_at: DateTime<Utc>) -> Result<usize, StoreError> {
        (**self).mark_sent(ids, sent_at)
    }
}

/// In-memory outbox for tests and single-process use.
///
/// Cloning creates another handle to the same table.
#[derive(Clone)]
pub struct InMemoryOutboxStore {
    rows: Arc<RwLock<BTreeMap<i64, OutboxEvent>>>,
    next_id: Arc<AtomicI64>,
}

impl Default for InMemoryOutboxStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    /// Capture an event, assigning the next id from the sequence.
    pub fn append(&self, event: NewOutboxEvent) -> Result<i64, StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::LockPoisoned("append"))?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        rows.insert(id, event.into_event(id));
        Ok(id)
    }

    pub fn get(&self, id: i64) -> Result<Option<OutboxEvent>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::LockPoisoned("get"))?;
        Ok(rows.get(&id).cloned())
    }

    pub fn events(&self) -> Result<Vec<OutboxEvent>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::LockPoisoned("events"))?;
        Ok(rows.values().cloned().collect())
    }

    pub fn count_by_status(&self, status: OutboxStatus) -> Result<usize, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::LockPoisoned("count"))?;
        Ok(rows.values().filter(|row| row.status == status).count())
    }

    pub fn pending_count(&self) -> Result<usize, StoreError> {
        self.count_by_status(OutboxStatus::Pending)
    }
}

impl OutboxStore for InMemoryOutboxStore {
    fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxEvent>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::LockPoisoned("fetch_pending"))?;

        Ok(rows
            .values()
            .filter(|row| row.is_pending())
            .take(limit)
            .cloned()
            .collect())
    }

    fn mark_sent(&self, ids: &[i64], sent_at: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::LockPoisoned("mark_sent"))?;

        let mut updated = 0;
        for id in ids {
            if let Some(row) = rows.get_mut(id) {
                if row.mark_sent(sent_at) {
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn event(n: usize) -> NewOutboxEvent {
        NewOutboxEvent::new(
            "ClientActivateBusinessEvent",
            "ClientDataV1",
            format!("{{\"n\":{}}}", n).into_bytes(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            format!("idem-{}", n),
        )
    }

    #[test]
    fn append_assigns_increasing_ids() {
        let store = InMemoryOutboxStore::new();
        let a = store.append(event(1)).unwrap();
        let b = store.append(event(2)).unwrap();
        assert!(b > a);
        assert_eq!(store.pending_count().unwrap(), 2);
    }

    #[test]
    fn fetch_pending_respects_limit_and_order() {
        let store = InMemoryOutboxStore::new();
        for n in 0..10 {
            store.append(event(n)).unwrap();
        }

        let batch = store.fetch_pending(4).unwrap();
        assert_eq!(batch.len(), 4);
        assert!(batch.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn fetch_pending_skips_sent_rows() {
        let store = InMemoryOutboxStore::new();
        let first = store.append(event(1)).unwrap();
        let second = store.append(event(2)).unwrap();

        store.mark_sent(&[first], Utc::now()).unwrap();

        let batch = store.fetch_pending(10).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, second);
    }

    #[test]
    fn mark_sent_is_idempotent() {
        let store = InMemoryOutboxStore::new();
        let id = store.append(event(1)).unwrap();
        let sent_at = Utc::now();

        assert_eq!(store.mark_sent(&[id, 999], sent_at).unwrap(), 1);
        assert_eq!(store.mark_sent(&[id], Utc::now()).unwrap(), 0);

        let row = store.get(id).unwrap().unwrap();
        assert_eq!(row.status, OutboxStatus::Sent);
        assert_eq!(row.sent_at, Some(sent_at));
    }

    #[test]
    fn clones_share_storage() {
        let store = InMemoryOutboxStore::new();
        let handle = store.clone();
        store.append(event(1)).unwrap();
        assert_eq!(handle.pending_count().unwrap(), 1);
    }
}
