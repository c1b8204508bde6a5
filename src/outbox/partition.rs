use std::collections::HashMap;
use std::fmt;
use std::slice::Chunks;

use super::record::OutboxEvent;

/// Ordering key of a batch: the aggregate root id, or a sentinel for
/// events that have none.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(i64);

impl PartitionKey {
    /// Shared key of every aggregate-less event.
    pub const NONE: PartitionKey = PartitionKey(-1);

    pub fn new(aggregate_root_id: Option<i64>) -> Self {
        aggregate_root_id.map_or(Self::NONE, PartitionKey)
    }

    pub fn of(event: &OutboxEvent) -> Self {
        Self::new(event.aggregate_root_id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The events of one batch that share a partition key, in read order.
#[derive(Clone, Debug, PartialEq)]
pub struct Partition<T> {
    pub key: PartitionKey,
    pub items: Vec<T>,
}

impl<T> Partition<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Convert every item in order, stopping at the first error.
    pub fn try_map<U, E, F>(self, f: F) -> Result<Partition<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        let items = self.items.into_iter().map(f).collect::<Result<Vec<_>, E>>()?;
        Ok(Partition {
            key: self.key,
            items,
        })
    }
}

/// Group a batch by partition key.
///
/// Rows keep their input order inside each partition. Partitions are
/// returned in order of first appearance in the batch.
pub fn partition(rows: Vec<OutboxEvent>) -> Vec<Partition<OutboxEvent>> {
    let mut slots: HashMap<PartitionKey, usize> = HashMap::new();
    let mut partitions: Vec<Partition<OutboxEvent>> = Vec::new();

    for row in rows {
        let key = PartitionKey::of(&row);
        let slot = *slots.entry(key).or_insert_with(|| {
            partitions.push(Partition {
                key,
                items: Vec::new(),
            });
            partitions.len() - 1
        });
        partitions[slot].items.push(row);
    }

    partitions
}

/// Split the id set of a batch into mark-sent statements of at most
/// `partition_size` ids.
pub fn mark_chunks(ids: &[i64], partition_size: usize) -> Chunks<'_, i64> {
    ids.chunks(partition_size.max(1))
}
