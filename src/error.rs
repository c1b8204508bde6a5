use thiserror::Error;

/// Errors raised by an outbox store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("outbox store lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("outbox store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while turning an outbox row into wire bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    #[error("event is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("no serializer registered for event type `{0}`")]
    UnknownType(String),

    #[error("encoding failed: {0}")]
    Encoding(String),
}

/// Errors raised by a channel connection or the router in front of it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("connection {index} failed: {reason}")]
    ConnectionFailed { index: usize, reason: String },

    #[error("message rejected on connection {index}: {reason}")]
    Rejected { index: usize, reason: String },

    #[error("send panicked on connection {index}: {reason}")]
    Panicked { index: usize, reason: String },

    #[error("worker for connection {0} is gone")]
    WorkerGone(usize),

    #[error("channel buffer poisoned")]
    BufferPoisoned,
}

/// Errors raised while loading or validating dispatch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got `{value}`")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be a boolean, got `{value}`")]
    InvalidFlag { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Everything that can end a dispatch run early.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to serialize event {event_id}: {source}")]
    Serialize {
        event_id: i64,
        #[source]
        source: SerializeError,
    },

    #[error("send error: {0}")]
    Send(#[from] SendError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DispatchError {
    /// Short label used in logs and run outcomes.
    pub fn stage(&self) -> &'static str {
        match self {
            DispatchError::Store(_) => "store",
            DispatchError::Serialize { .. } => "serialize",
            DispatchError::Send(_) => "send",
            DispatchError::Config(_) => "config",
        }
    }
}
