//! In-memory channel for testing and single-process scenarios.
//!
//! Every delivery is appended to a shared log tagged with the connection it
//! went through, so ordering per connection can be inspected afterwards.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::SendError;

use super::{Channel, Connection};

/// One message observed on a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub connection: usize,
    pub payload: Vec<u8>,
}

type RejectFn = dyn Fn(&[u8]) -> bool + Send + Sync;

/// Channel whose connections record deliveries into a shared log.
///
/// Cloning creates another handle to the same log.
///
/// ```
/// use outbox_relay::{Channel, Connection, InMemoryChannel};
///
/// let channel = InMemoryChannel::new();
/// let mut connection = channel.connect(0).unwrap();
/// connection.send(b"hello").unwrap();
///
/// assert_eq!(channel.len(), 1);
/// assert_eq!(channel.on_connection(0)[0].payload, b"hello".to_vec());
/// ```
#[derive(Clone)]
pub struct InMemoryChannel {
    log: Arc<RwLock<Vec<Delivery>>>,
    enabled: Arc<AtomicBool>,
    opened: Arc<AtomicUsize>,
    closed: Arc<Mutex<Vec<usize>>>,
    fail_connect_at: Option<usize>,
    reject: Option<Arc<RejectFn>>,
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self {
            log: Arc::new(RwLock::new(Vec::new())),
            enabled: Arc::new(AtomicBool::new(true)),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(Mutex::new(Vec::new())),
            fail_connect_at: None,
            reject: None,
        }
    }

    /// Refuse to open the connection for slot `index`.
    pub fn failing_connect_at(mut self, index: usize) -> Self {
        self.fail_connect_at = Some(index);
        self
    }

    /// Reject any message for which `predicate` returns true.
    pub fn rejecting<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.reject = Some(Arc::new(predicate));
        self
    }

    /// Flip the administrative switch seen by `Channel::is_enabled`.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Get all deliveries in arrival order.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.log
            .read()
            .map(|log| log.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Get the deliveries of one connection in arrival order.
    pub fn on_connection(&self, connection: usize) -> Vec<Delivery> {
        self.deliveries()
            .into_iter()
            .filter(|d| d.connection == connection)
            .collect()
    }

    /// Get the total number of deliveries.
    pub fn len(&self) -> usize {
        self.deliveries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of connections opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Slots whose connection has been closed, in close order.
    pub fn closed_connections(&self) -> Vec<usize> {
        self.closed
            .lock()
            .map(|closed| closed.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Channel for InMemoryChannel {
    type Connection = InMemoryConnection;

    fn connect(&self, index: usize) -> Result<InMemoryConnection, SendError> {
        if self.fail_connect_at == Some(index) {
            return Err(SendError::ConnectionFailed {
                index,
                reason: "connection refused".to_string(),
            });
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(InMemoryConnection {
            index,
            log: Arc::clone(&self.log),
            closed: Arc::clone(&self.closed),
            reject: self.reject.clone(),
        })
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

/// Connection handed out by `InMemoryChannel`.
pub struct InMemoryConnection {
    index: usize,
    log: Arc<RwLock<Vec<Delivery>>>,
    closed: Arc<Mutex<Vec<usize>>>,
    reject: Option<Arc<RejectFn>>,
}

impl Connection for InMemoryConnection {
    fn send(&mut self, message: &[u8]) -> Result<(), SendError> {
        if let Some(reject) = &self.reject {
            if reject(message) {
                return Err(SendError::Rejected {
                    index: self.index,
                    reason: "rejected by channel".to_string(),
                });
            }
        }
        let mut log = self.log.write().map_err(|_| SendError::BufferPoisoned)?;
        log.push(Delivery {
            connection: self.index,
            payload: message.to_vec(),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), SendError> {
        let mut closed = self.closed.lock().map_err(|_| SendError::BufferPoisoned)?;
        closed.push(self.index);
        Ok(())
    }
}
