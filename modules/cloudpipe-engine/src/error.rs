//! Typed errors for engine operations.

use thiserror::Error;

/// Errors surfaced synchronously to engine callers.
///
/// Failures inside scheduled polls never reach a caller; they are logged
/// and the batch is retried on the next interval. They only show up here
/// through `EventSourcingEngine::poll_now`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A handler with this name already has a polling task
    #[error("handler already registered: {name}")]
    AlreadyRegistered { name: String },

    /// No handler with this name has been enabled
    #[error("handler not registered: {name}")]
    NotRegistered { name: String },

    #[error("stream name must not be empty")]
    EmptyStream,

    #[error("handler name must not be empty")]
    EmptyHandlerName,

    #[error("event type must not be empty")]
    EmptyEventType,

    /// Polling frequency was zero
    #[error("polling frequency must be positive for handler {name}")]
    InvalidFrequency { name: String },

    /// Start pointers are 0, a positive message id, or i64::MAX
    #[error("invalid start pointer: {0}")]
    InvalidStartPointer(i64),

    /// Stream or cursor backend failed
    #[error("store error: {0:#}")]
    Store(#[source] anyhow::Error),

    /// A poll batch was aborted by a handler or read failure
    #[error("poll failed for handler {name}: {source:#}")]
    Poll {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
