use crate::backoff::BackoffConfig;
use std::fmt;
use std::time::Duration;

/// Connection state as observed by consumers.
///
/// The session identifier exists only while `Connected` and the error
/// description only while `Error`, so neither can outlive its state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session; `initialize()` has not been called or `disconnect()` ran.
    #[default]
    NotInitialized,
    /// A connect attempt is in flight.
    Connecting,
    /// Transport connected.
    Connected {
        /// Identifier assigned by the transport, if it provides one.
        session_id: Option<String>,
    },
    /// An established connection dropped; a reconnect is scheduled.
    Disconnected,
    /// The last connect attempt failed; a reconnect is scheduled.
    Error {
        /// Description of the failure.
        last_error: String,
    },
}

impl ConnectionState {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::NotInitialized => ConnectionStatus::NotInitialized,
            ConnectionState::Connecting => ConnectionStatus::Connecting,
            ConnectionState::Connected { .. } => ConnectionStatus::Connected,
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::Error { .. } => ConnectionStatus::Error,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            ConnectionState::Connected { session_id } => session_id.as_deref(),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        match self {
            ConnectionState::Error { last_error } => Some(last_error),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }
}

/// Data-free discriminant of [`ConnectionState`], used for transition checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    NotInitialized,
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    /// Whether the state machine has an edge from `self` to `next`.
    ///
    /// ```text
    /// NotInitialized --initialize--> Connecting
    /// Connecting     --success-----> Connected
    /// Connecting     --failure-----> Error
    /// Connected      --drop--------> Disconnected
    /// Disconnected   --retry-------> Connecting
    /// Error          --retry-------> Connecting
    /// any            --disconnect--> NotInitialized
    /// ```
    pub fn can_transition_to(self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        matches!(
            (self, next),
            (NotInitialized, Connecting)
                | (Connecting, Connected)
                | (Connecting, Error)
                | (Connected, Disconnected)
                | (Disconnected, Connecting)
                | (Error, Connecting)
                | (_, NotInitialized)
        )
    }
}

/// One applied edge of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionStatus,
    pub to: ConnectionStatus,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionStatus::NotInitialized => write!(f, "not_initialized"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Time allowed for a single connect attempt
    pub connect_timeout: Duration,
    /// Reconnect delay policy
    pub backoff: BackoffConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            backoff: BackoffConfig::default(),
        }
    }
}
