use crate::error::SerializeError;
use crate::outbox::OutboxEvent;

use super::{EventSerializer, WireMessage};

/// Encodes rows as JSON `WireMessage`s with a base64 `data` field.
#[derive(Debug, Clone)]
pub struct JsonSerializer {
    source: String,
    tenant_id: Option<String>,
}

impl JsonSerializer {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            tenant_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

impl EventSerializer for JsonSerializer {
    fn serialize(&self, event: &OutboxEvent) -> Result<Vec<u8>, SerializeError> {
        let message = WireMessage::from_event(event, &self.source, self.tenant_id.as_deref())?;
        serde_json::to_vec(&message).map_err(|e| SerializeError::Encoding(e.to_string()))
    }
}

/// Encodes rows as compact bitcode `WireMessage`s.
#[derive(Debug, Clone)]
pub struct BitcodeSerializer {
    source: String,
    tenant_id: Option<String>,
}

impl BitcodeSerializer {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            tenant_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

impl EventSerializer for BitcodeSerializer {
    fn serialize(&self, event: &OutboxEvent) -> Result<Vec<u8>, SerializeError> {
        let message = WireMessage::from_event(event, &self.source, self.tenant_id.as_deref())?;
        bitcode::serialize(&message).map_err(|e| SerializeError::Encoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::NewOutboxEvent;
    use chrono::NaiveDate;

    fn event() -> OutboxEvent {
        NewOutboxEvent::new(
            "LoanDisbursalBusinessEvent",
            "LoanAccountDataV1",
            br#"{"principal":1000}"#.to_vec(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            "idem-3",
        )
        .for_aggregate(12)
        .into_event(3)
    }

    #[test]
    fn json_decodes_back() {
        let serializer = JsonSerializer::new("loans").with_tenant("tenant-a");
        let bytes = serializer.serialize(&event()).unwrap();
        let message = WireMessage::from_json(&bytes).unwrap();

        assert_eq!(message.id, 3);
        assert_eq!(message.event_type, "LoanDisbursalBusinessEvent");
        assert_eq!(message.tenant_id.as_deref(), Some("tenant-a"));
        assert_eq!(message.data_str(), Some(r#"{"principal":1000}"#));
    }

    #[test]
    fn bitcode_decodes_back() {
        let serializer = BitcodeSerializer::new("loans");
        let bytes = serializer.serialize(&event()).unwrap();
        let message = WireMessage::from_bitcode(&bytes).unwrap();

        assert_eq!(message.id, 3);
        assert_eq!(message.idempotency_key, "idem-3");
        assert_eq!(message.source, "loans");
        assert_eq!(message.tenant_id, None);
    }

    #[test]
    fn fails_loudly_on_invalid_row() {
        let mut row = event();
        row.event_type.clear();
        let err = JsonSerializer::new("loans").serialize(&row).unwrap_err();
        assert_eq!(err, SerializeError::MissingField("type"));
    }
}
