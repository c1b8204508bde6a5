use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SerializeError;
use crate::outbox::OutboxEvent;

/// Self-describing envelope put on the wire for every outbox row.
///
/// `idempotency_key` lets consumers discard the duplicates that
/// at-least-once delivery produces.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub id: i64,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created_at: DateTime<Utc>,
    pub business_date: NaiveDate,
    pub tenant_id: Option<String>,
    pub idempotency_key: String,
    pub dataschema: String,
    #[serde(with = "payload_serde")]
    pub data: Vec<u8>,
}

mod payload_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(payload: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(payload).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

impl WireMessage {
    /// Build the envelope for one row, refusing rows that would produce a
    /// message consumers cannot decode or deduplicate.
    pub fn from_event(
        event: &OutboxEvent,
        source: &str,
        tenant_id: Option<&str>,
    ) -> Result<Self, SerializeError> {
        if event.event_type.trim().is_empty() {
            return Err(SerializeError::MissingField("type"));
        }
        if event.schema.trim().is_empty() {
            return Err(SerializeError::MissingField("dataschema"));
        }
        if event.idempotency_key.trim().is_empty() {
            return Err(SerializeError::MissingField("idempotencyKey"));
        }

        Ok(Self {
            id: event.id,
            source: source.to_string(),
            event_type: event.event_type.clone(),
            created_at: event.created_at,
            business_date: event.business_date,
            tenant_id: tenant_id.map(str::to_string),
            idempotency_key: event.idempotency_key.clone(),
            dataschema: event.schema.clone(),
            data: event.payload.clone(),
        })
    }

    /// Decode a message produced by `JsonSerializer`.
    pub fn from_json(bytes: &[u8]) -> Result<Self, SerializeError> {
        serde_json::from_slice(bytes).map_err(|e| SerializeError::Encoding(e.to_string()))
    }

    /// Decode a message produced by `BitcodeSerializer`.
    pub fn from_bitcode(bytes: &[u8]) -> Result<Self, SerializeError> {
        bitcode::deserialize(bytes).map_err(|e| SerializeError::Encoding(e.to_string()))
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn data_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}
