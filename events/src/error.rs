//! Error types for the `events` crate.
//!
//! Follows the same pattern as the other workspace crates: a root `Error`
//! struct holding an `ErrorKind` and an optional source for chaining.

use std::error::Error as StdError;
use std::fmt;

/// Error returned by an [`EventHandler`](crate::EventHandler).
///
/// The bus never propagates these to the publisher; it logs them and keeps
/// delivering to the remaining handlers.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Categories of handler failure.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The event payload did not have the shape the handler expects.
    InvalidPayload,
    /// The handler failed for its own reasons.
    Handler,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Event handler error ({:?}): {}", self.error_kind, source),
            None => write!(f, "Event handler error ({:?})", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::InvalidPayload,
        }
    }
}

/// Helper function to create a payload error.
pub fn invalid_payload(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::InvalidPayload,
    }
}

/// Helper function to create a generic handler error.
pub fn handler_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Handler,
    }
}
