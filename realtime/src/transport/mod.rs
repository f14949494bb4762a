//! Transport abstraction for the realtime connection.
//!
//! The Connection Manager is the only component that touches the network,
//! and it does so exclusively through these traits. Production uses
//! [`sse::SseTransport`]; tests plug in scripted in-memory transports.

pub mod sse;

use crate::error::Error;
use async_trait::async_trait;
use serde_json::Value;

/// Something that can open realtime connections.
///
/// `connect` resolving to `Ok` is the transport's connect-success signal and
/// `Err` its connect-failure signal. The Connection Manager bounds every call
/// with its connect timeout and may drop the future at any point.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Type representing an open connection.
    type Connection: TransportConnection;

    /// Open a new connection.
    async fn connect(&self) -> Result<Self::Connection, Error>;
}

/// An open realtime connection.
///
/// Dropping the connection closes it.
#[async_trait]
pub trait TransportConnection: Send + 'static {
    /// Session identifier assigned during the handshake, if any.
    fn session_id(&self) -> Option<String>;

    /// Wait for the next inbound signal.
    ///
    /// Returns [`TransportEvent::Dropped`] once the connection is gone; it is
    /// not called again after that.
    async fn next_event(&mut self) -> TransportEvent;
}

/// Inbound signals from an open connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A payload event, republished on the bus under `topic` unmodified.
    Message { topic: String, payload: Value },
    /// The connection was lost.
    Dropped { reason: String },
}
