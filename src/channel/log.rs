use std::sync::{Arc, Mutex};

use crate::error::SendError;

use super::{Channel, Connection};

/// A simple channel that logs messages via `tracing` or into a buffer.
#[derive(Clone, Default)]
pub struct LogChannel {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl LogChannel {
    pub fn new() -> Self {
        LogChannel { buffer: None }
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        LogChannel {
            buffer: Some(buffer),
        }
    }
}

impl Channel for LogChannel {
    type Connection = LogConnection;

    fn connect(&self, index: usize) -> Result<LogConnection, SendError> {
        Ok(LogConnection {
            index,
            buffer: self.buffer.clone(),
        })
    }
}

pub struct LogConnection {
    index: usize,
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl Connection for LogConnection {
    fn send(&mut self, message: &[u8]) -> Result<(), SendError> {
        let message = String::from_utf8_lossy(message);
        if let Some(buffer) = &self.buffer {
            let mut buffer = buffer.lock().map_err(|_| SendError::BufferPoisoned)?;
            buffer.push(format!("[OUTBOX:{}] {}", self.index, message));
        } else {
            tracing::info!(connection = self.index, message = %message, "outbox message");
        }
        Ok(())
    }
}
