//! Event system infrastructure for the realtime core.
//!
//! This crate provides the in-process publish/subscribe bus that decouples
//! "a relevant event occurred" from "who needs to react". The Connection
//! Manager publishes onto it; the Auto-Refresh Coordinator, the Notification
//! Store and any UI layer subscribe to it.
//!
//! # Architecture
//!
//! - **Event**: a topic name plus an opaque JSON payload
//! - **EventHandler**: trait for anything that reacts to events (closures included)
//! - **EventBus**: topic-keyed registry that fans published events out to handlers
//! - **Lifecycle**: foreground/background notifier injected into the other components
//!
//! This crate has no dependencies on the other workspace crates and knows
//! nothing about transports. Payloads are carried as `serde_json::Value`.

pub mod bus;
pub mod error;
pub mod lifecycle;

pub use bus::{Event, EventBus, EventHandler, SubscriptionId};
pub use error::{Error, ErrorKind};
pub use lifecycle::{Lifecycle, LifecycleNotifier, LifecycleState};
