//! Channel connections and the router that fans partitions out over them.
//!
//! ```text
//! partitions ──► ChannelRouter ──consistent_hash(key, N)──► queue[i] ──► worker[i] ──► Connection[i]
//! ```
//!
//! Each connection is owned by exactly one worker thread fed by its own
//! queue, so messages routed to a connection leave in the order they were
//! queued without any extra sequencing.

mod hash;
mod in_memory;
mod log;
mod router;

use crate::error::SendError;

pub use hash::consistent_hash;
pub use in_memory::{Delivery, InMemoryChannel, InMemoryConnection};
pub use log::{LogChannel, LogConnection};
pub use router::{ChannelRouter, RouteReport};

/// One ordered send path to the external messaging system.
pub trait Connection: Send {
    /// Send one message. Messages are delivered in call order.
    fn send(&mut self, message: &[u8]) -> Result<(), SendError>;

    /// Release the connection. Called exactly once, when the router lets go
    /// of it.
    fn close(&mut self) -> Result<(), SendError> {
        Ok(())
    }
}

/// Factory for channel connections plus the channel's administrative switch.
pub trait Channel: Send + Sync {
    type Connection: Connection + 'static;

    /// Open the connection for router slot `index`.
    fn connect(&self, index: usize) -> Result<Self::Connection, SendError>;

    /// Whether the downstream channel currently accepts traffic.
    fn is_enabled(&self) -> bool {
        true
    }
}
