//! Error types for the `refresh` crate.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the refresh crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A refresh action reported failure. Logged by the coordinator, never
    /// propagated.
    RefreshActionFailed,
    /// A registration asked for a trigger that cannot fire, such as a zero
    /// interval.
    InvalidTrigger,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.error_kind {
            ErrorKind::RefreshActionFailed => "refresh action failed",
            ErrorKind::InvalidTrigger => "invalid trigger",
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

impl From<Box<dyn StdError + Send + Sync>> for Error {
    fn from(err: Box<dyn StdError + Send + Sync>) -> Self {
        Error {
            source: Some(err),
            error_kind: ErrorKind::RefreshActionFailed,
        }
    }
}

/// Helper function for refresh actions to report failure.
pub fn action_failed(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::RefreshActionFailed,
    }
}

pub(crate) fn invalid_trigger(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::InvalidTrigger,
    }
}
