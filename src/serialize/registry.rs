use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SerializeError;
use crate::outbox::OutboxEvent;

use super::EventSerializer;

/// Resolves a serializer by the event's type tag.
///
/// Lookups fall back to the default serializer when one is set; otherwise an
/// unregistered type is a serialization error.
#[derive(Clone, Default)]
pub struct SerializerRegistry {
    by_type: HashMap<String, Arc<dyn EventSerializer>>,
    fallback: Option<Arc<dyn EventSerializer>>,
}

impl SerializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a serializer for one event type.
    pub fn register<S>(mut self, event_type: impl Into<String>, serializer: S) -> Self
    where
        S: EventSerializer + 'static,
    {
        self.by_type.insert(event_type.into(), Arc::new(serializer));
        self
    }

    /// Serializer used for any type without an explicit registration.
    pub fn with_fallback<S>(mut self, serializer: S) -> Self
    where
        S: EventSerializer + 'static,
    {
        self.fallback = Some(Arc::new(serializer));
        self
    }

    pub fn resolve(&self, event_type: &str) -> Option<&Arc<dyn EventSerializer>> {
        self.by_type.get(event_type).or(self.fallback.as_ref())
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.by_type.contains_key(event_type)
    }
}

impl EventSerializer for SerializerRegistry {
    fn serialize(&self, event: &OutboxEvent) -> Result<Vec<u8>, SerializeError> {
        let serializer = self
            .resolve(&event.event_type)
            .ok_or_else(|| SerializeError::UnknownType(event.event_type.clone()))?;
        serializer.serialize(event)
    }
}
