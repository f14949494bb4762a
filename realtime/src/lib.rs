//! Realtime connection management.
//!
//! This crate owns the one long-lived connection between the app and the
//! backend and keeps it alive across network loss, server-side drops and
//! foreground/background transitions.
//!
//! # Architecture
//!
//! - **Single connection per process**: one [`Manager`] owns one transport
//!   connection and serializes every state transition.
//! - **Explicit state machine**: `NotInitialized`, `Connecting`, `Connected`,
//!   `Disconnected`, `Error`. Stale transitions (from a torn-down session or
//!   an outdated observed state) are rejected silently.
//! - **Exponential backoff**: unbounded retries with a capped delay, reset
//!   after every successful connect, suspended while the app is backgrounded
//!   and resumed immediately on foreground.
//! - **Bus-only output**: inbound payload events are republished on the
//!   [`events::EventBus`] under their own topic, unmodified; status changes go
//!   out on `status:connected`, `status:disconnected` and `status:error`.
//! - **No errors to callers**: transport failures become the `Error` state plus
//!   a bus event, never a return value.
//!
//! # Message Flow
//!
//! 1. UI calls `manager.initialize()`
//! 2. Driver task opens the transport, bounded by the connect timeout
//! 3. On success the state becomes `Connected` and `status:connected` is published
//! 4. Each inbound `(topic, payload)` is published on the bus as-is
//! 5. On drop or failure the state becomes `Disconnected`/`Error` and a retry is scheduled
//! 6. `manager.disconnect()` aborts the driver and returns to `NotInitialized`
//!
//! # Example
//!
//! ```rust,ignore
//! use events::{EventBus, Lifecycle};
//! use realtime::{transport::sse::SseTransport, ConnectionConfig, Manager};
//! use std::sync::Arc;
//!
//! let bus = EventBus::new();
//! let lifecycle = Lifecycle::default();
//! let manager = Manager::new(
//!     SseTransport::new("https://api.example.com/realtime"),
//!     bus.clone(),
//!     Arc::new(lifecycle.clone()),
//!     ConnectionConfig::default(),
//! );
//! manager.initialize();
//! ```
//!
//! # Modules
//!
//! - `backoff`: exponential reconnect delay policy
//! - `connection`: `ConnectionState`, transition table and `ConnectionConfig`
//! - `manager`: the Connection Manager and its driver task
//! - `message`: status topics and their payloads
//! - `transport`: transport traits and the SSE implementation

pub mod backoff;
pub mod connection;
pub mod error;
pub mod manager;
pub mod message;
pub mod transport;

pub use backoff::{Backoff, BackoffConfig};
pub use connection::{ConnectionConfig, ConnectionState, ConnectionStatus, Transition};
pub use error::{Error, ErrorKind};
pub use manager::Manager;
