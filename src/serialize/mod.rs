//! Wire serialization of outbox rows.
//!
//! The dispatch job only sees the `EventSerializer` capability. Which
//! concrete encoding is used for a row can be decided per event type via
//! `SerializerRegistry`.

mod codec;
mod message;
mod registry;

use std::sync::Arc;

use crate::error::SerializeError;
use crate::outbox::OutboxEvent;

pub use codec::{BitcodeSerializer, JsonSerializer};
pub use message::WireMessage;
pub use registry::SerializerRegistry;

/// Turns one outbox row into an opaque byte sequence for the channel.
///
/// Implementations must return an error rather than emit a malformed
/// message; the dispatch job aborts the whole run on any error.
pub trait EventSerializer: Send + Sync {
    fn serialize(&self, event: &OutboxEvent) -> Result<Vec<u8>, SerializeError>;
}

impl<T: EventSerializer + ?Sized> EventSerializer for Arc<T> {
    fn serialize(&self, event: &OutboxEvent) -> Result<Vec<u8>, SerializeError> {
        (**self).serialize(event)
    }
}

impl<T: EventSerializer + ?Sized> EventSerializer for Box<T> {
    fn serialize(&self, event: &OutboxEvent) -> Result<Vec<u8>, SerializeError> {
        (**self).serialize(event)
    }
}
