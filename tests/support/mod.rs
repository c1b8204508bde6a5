//! Shared fixtures and fault-injecting collaborators for integration tests.

#![allow(dead_code)]

mod serializer;
mod store;

use chrono::NaiveDate;
use outbox_relay::{Delivery, NewOutboxEvent, WireMessage};

pub use serializer::FailingSerializer;
pub use store::RecordingStore;

pub fn business_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
}

/// A captured event for `aggregate` (or a system-level event for `None`).
pub fn event(event_type: &str, aggregate: Option<i64>, key: &str) -> NewOutboxEvent {
    let mut event = NewOutboxEvent::new(
        event_type,
        format!("{}DataV1", event_type),
        format!(r#"{{"key":"{}"}}"#, key).into_bytes(),
        business_date(),
        key,
    );
    event.aggregate_root_id = aggregate;
    event
}

/// Decode JSON wire messages back into outbox ids.
pub fn ids(deliveries: &[Delivery]) -> Vec<i64> {
    deliveries
        .iter()
        .map(|d| WireMessage::from_json(&d.payload).unwrap().id)
        .collect()
}

/// Decode JSON wire messages back into idempotency keys.
pub fn keys(deliveries: &[Delivery]) -> Vec<String> {
    deliveries
        .iter()
        .map(|d| WireMessage::from_json(&d.payload).unwrap().idempotency_key)
        .collect()
}
