use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use outbox_relay::{EventSerializer, JsonSerializer, OutboxEvent, SerializeError};

/// JSON serializer that fails on its `fail_on`-th call (1-based).
#[derive(Clone)]
pub struct FailingSerializer {
    inner: JsonSerializer,
    calls: Arc<AtomicUsize>,
    fail_on: usize,
}

impl FailingSerializer {
    pub fn new(fail_on: usize) -> Self {
        Self {
            inner: JsonSerializer::new("test"),
            calls: Arc::new(AtomicUsize::new(0)),
            fail_on,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EventSerializer for FailingSerializer {
    fn serialize(&self, event: &OutboxEvent) -> Result<Vec<u8>, SerializeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(SerializeError::Encoding(format!("schema registry rejected event {}", event.id)));
        }
        self.inner.serialize(event)
    }
}
