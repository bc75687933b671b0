//! Error types for the session engine.
//!
//! # Design
//! Everything that can go wrong while a request is in flight resolves into
//! one `SessionError` handed to the completion callbacks. Errors are `Clone`
//! because the same terminal result is delivered to every registered
//! callback. Exhausted authentication is deliberately absent: the last
//! challenge response is the result, not an error.

use thiserror::Error;

/// Failure reported by a `Transport` for one task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("could not connect: {0}")]
    ConnectionFailed(String),

    #[error("host not found: {0}")]
    CannotFindHost(String),

    #[error("request timed out")]
    TimedOut,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// Terminal failure of a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("request was explicitly cancelled")]
    ExplicitlyCancelled,

    /// The owning `Session` was dropped before the request could start.
    #[error("session was deinitialized before the request started")]
    SessionDeinitialized,

    /// A caller-supplied policy closure panicked.
    #[error("{handler} handler panicked: {message}")]
    HandlerPanicked {
        handler: &'static str,
        message: String,
    },

    #[error("exceeded the limit of {limit} redirects")]
    TooManyRedirects { limit: u32 },

    #[error("response status {status} is not acceptable")]
    UnacceptableStatus { status: u16 },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SessionError {
    pub(crate) fn panicked(handler: &'static str, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        SessionError::HandlerPanicked { handler, message }
    }
}

/// Failure to write a cache entry. Never affects the delivered result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("entry of {size} bytes exceeds cache capacity of {capacity} bytes")]
    ExceedsCapacity { size: usize, capacity: usize },

    #[error("entry storage policy does not allow caching")]
    StorageNotAllowed,
}
