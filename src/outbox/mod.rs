mod partition;
mod record;
mod store;

// Rows
pub use record::{NewOutboxEvent, OutboxEvent, OutboxStatus};

// Storage
pub use store::{InMemoryOutboxStore, OutboxStore};

// Grouping
pub use partition::{mark_chunks, partition, Partition, PartitionKey};
