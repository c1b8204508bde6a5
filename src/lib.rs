//! Outbox drain-and-dispatch engine.
//!
//! Domain events are captured into an outbox inside the business transaction.
//! A `DispatchJob` later drains pending rows in id order, groups them by
//! aggregate root, and relays them over a fixed pool of channel connections.
//! Every aggregate is pinned to one connection by a consistent hash, so its
//! events are never reordered; delivery is at-least-once and consumers
//! deduplicate on the idempotency key carried in each message.

mod channel;
mod config;
mod dispatch;
mod error;
mod outbox;
mod serialize;

pub use channel::{
    consistent_hash, Channel, ChannelRouter, Connection, Delivery, InMemoryChannel,
    InMemoryConnection, LogChannel, LogConnection, RouteReport,
};
pub use config::DispatchConfig;
pub use dispatch::{DispatchJob, DispatchReport, DispatchWorkerThread, RunOutcome, WorkerStats};
pub use error::{ConfigError, DispatchError, SendError, SerializeError, StoreError};
pub use outbox::{
    mark_chunks, partition, InMemoryOutboxStore, NewOutboxEvent, OutboxEvent, OutboxStatus,
    OutboxStore, Partition, PartitionKey,
};
pub use serialize::{
    BitcodeSerializer, EventSerializer, JsonSerializer, SerializerRegistry, WireMessage,
};
