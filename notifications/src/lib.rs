//! Notification store.
//!
//! Holds the user's notifications, most recent first and unique by id. The
//! collection only changes through five bus topics
//! (`NOTIFICATION_RECEIVED`, `NOTIFICATION_READ`, `NOTIFICATION_READ_ALL`,
//! `REMOVE_NOTIFICATION`, `CLEAR_NOTIFICATIONS`), each decoded into a
//! [`NotificationAction`] and applied by the pure [`reduce`] function.
//! Transport-originated and UI-originated changes take the same path: the
//! `publish_*` helpers put UI changes on the bus.

pub mod notification;
pub mod reducer;
pub mod store;

pub use notification::{
    Notification, NotificationAction, CLEAR_NOTIFICATIONS, NOTIFICATION_READ,
    NOTIFICATION_READ_ALL, NOTIFICATION_RECEIVED, REMOVE_NOTIFICATION,
};
pub use reducer::reduce;
pub use store::{
    publish_clear, publish_read, publish_read_all, publish_received, publish_received_at,
    publish_remove, NotificationStore, NotificationSubscriptions,
};
