//! Notification entity, the bus topics that mutate it and their payloads.

use chrono::{DateTime, Utc};
use events::error::invalid_payload;
use events::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A new notification arrived. Payload: `{ "id", "payload"?, "receivedAt"? }`.
pub const NOTIFICATION_RECEIVED: &str = "NOTIFICATION_RECEIVED";
/// One notification was read. Payload: `{ "id" }`.
pub const NOTIFICATION_READ: &str = "NOTIFICATION_READ";
/// Every notification was read. Payload ignored.
pub const NOTIFICATION_READ_ALL: &str = "NOTIFICATION_READ_ALL";
/// One notification was dismissed. Payload: `{ "id" }`.
pub const REMOVE_NOTIFICATION: &str = "REMOVE_NOTIFICATION";
/// Every notification was dismissed. Payload ignored.
pub const CLEAR_NOTIFICATIONS: &str = "CLEAR_NOTIFICATIONS";

/// Every topic the store listens on.
pub const TOPICS: [&str; 5] = [
    NOTIFICATION_RECEIVED,
    NOTIFICATION_READ,
    NOTIFICATION_READ_ALL,
    REMOVE_NOTIFICATION,
    CLEAR_NOTIFICATIONS,
];

/// A user-facing notification. Unique by `id` within a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    /// Domain data, opaque to the store.
    pub payload: Value,
    pub is_read: bool,
    pub received_at: DateTime<Utc>,
}

impl Notification {
    /// Unread notification received now.
    pub fn new(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            payload,
            is_read: false,
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Received {
    id: String,
    #[serde(default)]
    payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Target {
    id: String,
}

/// The only ways a notification collection changes.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationAction {
    Received(Notification),
    Read { id: String },
    ReadAll,
    Remove { id: String },
    Clear,
}

impl NotificationAction {
    /// Decode a bus event into an action.
    ///
    /// Fails for unknown topics and for payloads missing a required field.
    pub fn from_event(event: &Event) -> Result<Self, events::Error> {
        let payload = &event.payload;
        match event.topic.as_str() {
            NOTIFICATION_RECEIVED => {
                let received = Received::deserialize(payload)?;
                Ok(NotificationAction::Received(Notification {
                    id: received.id,
                    payload: received.payload,
                    is_read: false,
                    received_at: received.received_at.unwrap_or_else(Utc::now),
                }))
            }
            NOTIFICATION_READ => Ok(NotificationAction::Read {
                id: Target::deserialize(payload)?.id,
            }),
            NOTIFICATION_READ_ALL => Ok(NotificationAction::ReadAll),
            REMOVE_NOTIFICATION => Ok(NotificationAction::Remove {
                id: Target::deserialize(payload)?.id,
            }),
            CLEAR_NOTIFICATIONS => Ok(NotificationAction::Clear),
            other => Err(invalid_payload(&format!(
                "'{}' is not a notification topic",
                other
            ))),
        }
    }

    /// Topic this action travels on.
    pub fn topic(&self) -> &'static str {
        match self {
            NotificationAction::Received(_) => NOTIFICATION_RECEIVED,
            NotificationAction::Read { .. } => NOTIFICATION_READ,
            NotificationAction::ReadAll => NOTIFICATION_READ_ALL,
            NotificationAction::Remove { .. } => REMOVE_NOTIFICATION,
            NotificationAction::Clear => CLEAR_NOTIFICATIONS,
        }
    }

    /// Bus payload for this action.
    pub fn payload(&self) -> Value {
        let encoded = match self {
            NotificationAction::Received(notification) => serde_json::to_value(Received {
                id: notification.id.clone(),
                payload: notification.payload.clone(),
                received_at: Some(notification.received_at),
            }),
            NotificationAction::Read { id } | NotificationAction::Remove { id } => {
                serde_json::to_value(Target { id: id.clone() })
            }
            NotificationAction::ReadAll | NotificationAction::Clear => Ok(Value::Null),
        };
        // Strings, timestamps and JSON values always serialize
        encoded.unwrap_or(Value::Null)
    }
}
