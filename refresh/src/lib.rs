//! Auto-refresh coordination.
//!
//! Screens register a refresh action together with the triggers that should
//! re-run it: the app returning to the foreground, events on named bus
//! topics, or a fixed interval. The [`Coordinator`] guarantees at most one
//! in-flight invocation per registration; triggers that arrive while it runs
//! are coalesced into a single follow-up run instead of piling up.
//!
//! ```rust,ignore
//! use refresh::{Coordinator, Trigger};
//! use std::time::Duration;
//!
//! let coordinator = Coordinator::new(bus.clone(), Arc::new(lifecycle.clone()));
//! let handle = coordinator.register(
//!     || async { reload_rides().await },
//!     [
//!         Trigger::AppForegrounded,
//!         Trigger::topic("ride:updated"),
//!         Trigger::Interval(Duration::from_secs(60)),
//!     ],
//! )?;
//! // Dropping `handle` releases every listener at once
//! ```

pub mod action;
pub mod coordinator;
pub mod error;

pub use action::{RefreshAction, Trigger};
pub use coordinator::{Coordinator, RefreshHandle};
pub use error::{Error, ErrorKind};
