//! Dispatch - drains the outbox and relays events over the channel router.
//!
//! One run reads a bounded batch of pending rows, groups them by aggregate
//! root, serializes every row, sends each partition through its routed
//! connection and only then marks the batch sent. Marking last means a
//! crash or error anywhere earlier leaves the rows pending, so the next run
//! resends them (at-least-once; consumers deduplicate on the idempotency
//! key).
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use outbox_relay::{
//!     DispatchConfig, DispatchJob, InMemoryChannel, InMemoryOutboxStore, JsonSerializer,
//!     NewOutboxEvent, RunOutcome,
//! };
//!
//! let store = InMemoryOutboxStore::new();
//! let channel = InMemoryChannel::new();
//! let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
//! store
//!     .append(NewOutboxEvent::new("ClientActivateBusinessEvent", "ClientDataV1", b"{}".to_vec(), date, "k-1").for_aggregate(1))
//!     .unwrap();
//!
//! let job = DispatchJob::new(
//!     store.clone(),
//!     JsonSerializer::new("core"),
//!     channel.clone(),
//!     DispatchConfig::default().with_connection_count(2),
//! )
//! .unwrap();
//!
//! assert!(matches!(job.run_once(), RunOutcome::Dispatched(_)));
//! assert_eq!(channel.len(), 1);
//! assert_eq!(store.pending_count().unwrap(), 0);
//! ```

mod job;
mod thread;

pub use job::{DispatchJob, DispatchReport, RunOutcome};
pub use thread::{DispatchWorkerThread, WorkerStats};
