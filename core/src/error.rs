//! Error types for the request executor.
//!
//! # Design
//! The taxonomy is flat: every failure is terminal for the invocation and is
//! handed to the completion as-is. `DecodeError` covers both a missing body
//! and a body that does not decode into the target type; the serde error is
//! logged, not carried. `TransportError` keeps the transport's own cause so
//! callers can downcast it.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Errors delivered to a `NetworkService` completion.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The URL string is not a parseable absolute URL. No request was sent.
    #[error("invalid URL")]
    InvalidUrl,

    /// The POST body could not be serialized to JSON. No request was sent.
    #[error("request body could not be serialized: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The transport reported a network or I/O failure.
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    /// The transport completed without a well-formed HTTP response.
    #[error("response is not an HTTP response")]
    WrongResponse,

    /// The server answered with a status outside `200..=299`.
    #[error("unexpected HTTP status {0}")]
    WrongStatusCode(u16),

    /// The body was missing or could not be decoded into the target type.
    #[error("response body could not be decoded")]
    DecodeError,
}

impl NetworkError {
    /// The HTTP status for `WrongStatusCode`, `None` otherwise.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            NetworkError::WrongStatusCode(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, NetworkError::Transport(_))
    }
}

/// A failure reported by a `Transport`, wrapping its original cause.
#[derive(Debug)]
pub struct TransportError {
    cause: Box<dyn StdError + Send + Sync + 'static>,
}

impl TransportError {
    pub fn new(cause: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    /// The transport released the request without ever reporting an outcome.
    pub(crate) fn dropped() -> Self {
        Self::new("transport dropped the request without completing it")
    }

    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.cause
    }

    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync + 'static> {
        self.cause
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.cause, f)
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.cause)
    }
}
