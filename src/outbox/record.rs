use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum OutboxStatus {
    Pending,
    Sent,
}

/// Durable domain event awaiting relay to the external channel.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct OutboxEvent {
    pub id: i64,
    /// Business entity the event concerns; `None` for system-level events.
    pub aggregate_root_id: Option<i64>,
    pub event_type: String,
    /// Type tag telling consumers how to decode `payload`.
    pub schema: String,
    pub payload: Vec<u8>,
    pub business_date: NaiveDate,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub status: OutboxStatus,
    pub sent_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    pub fn is_pending(&self) -> bool {
        self.status == OutboxStatus::Pending
    }

    pub fn is_sent(&self) -> bool {
        self.status == OutboxStatus::Sent
    }

    /// Flip to `Sent`. Returns false if the row was already sent; `sent_at`
    /// is never overwritten.
    pub(crate) fn mark_sent(&mut self, sent_at: DateTime<Utc>) -> bool {
        if self.is_sent() {
            return false;
        }
        self.status = OutboxStatus::Sent;
        self.sent_at = Some(sent_at);
        true
    }
}

/// A captured event before the store has assigned it an id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewOutboxEvent {
    pub aggregate_root_id: Option<i64>,
    pub event_type: String,
    pub schema: String,
    pub payload: Vec<u8>,
    pub business_date: NaiveDate,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

impl NewOutboxEvent {
    pub fn new(
        event_type: impl Into<String>,
        schema: impl Into<String>,
        payload: Vec<u8>,
        business_date: NaiveDate,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            aggregate_root_id: None,
            event_type: event_type.into(),
            schema: schema.into(),
            payload,
            business_date,
            idempotency_key: idempotency_key.into(),
            created_at: Utc::now(),
        }
    }

    /// Attach the aggregate root the event belongs to.
    pub fn for_aggregate(mut self, aggregate_root_id: i64) -> Self {
        self.aggregate_root_id = Some(aggregate_root_id);
        self
    }

    pub(crate) fn into_event(self, id: i64) -> OutboxEvent {
        OutboxEvent {
            id,
            aggregate_root_id: self.aggregate_root_id,
            event_type: self.event_type,
            schema: self.schema,
            payload: self.payload,
            business_date: self.business_date,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
            status: OutboxStatus::Pending,
            sent_at: None,
        }
    }
}
