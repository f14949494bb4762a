//! Error types for the `realtime` crate.
//!
//! Transport failures never reach callers of the Connection Manager. They are
//! produced by [`Transport`](crate::transport::Transport) implementations and
//! the connect timeout, then folded into `ConnectionState::Error` and a
//! `status:error` bus event.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the realtime crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the realtime core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport could not establish a connection.
    ConnectFailure,
    /// Transport did not establish a connection within the connect timeout.
    ConnectTimeout,
    /// An established connection was lost.
    TransportDropped,
    /// A stale or duplicate lifecycle call. Never surfaced, only logged.
    InvalidTransitionIgnored,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.error_kind {
            ErrorKind::ConnectFailure => "connect failure",
            ErrorKind::ConnectTimeout => "connect timeout",
            ErrorKind::TransportDropped => "transport dropped",
            ErrorKind::InvalidTransitionIgnored => "invalid transition ignored",
        };
        match &self.source {
            Some(source) => write!(f, "{}: {}", kind, source),
            None => write!(f, "{}", kind),
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

impl From<eventsource_client::Error> for Error {
    fn from(err: eventsource_client::Error) -> Self {
        Error {
            source: Some(err.to_string().into()),
            error_kind: ErrorKind::ConnectFailure,
        }
    }
}

/// Helper function to create connect failure errors.
pub fn connect_failure(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::ConnectFailure,
    }
}

/// Helper function to create connect timeout errors.
pub fn connect_timeout(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::ConnectTimeout,
    }
}

/// Helper function to create transport dropped errors.
pub fn transport_dropped(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::TransportDropped,
    }
}

/// Helper function to describe a rejected state transition.
pub fn invalid_transition(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::InvalidTransitionIgnored,
    }
}
