use serde::Serialize;
use serde_json::Value;

/// Bus topic published when the transport connects.
pub const STATUS_CONNECTED: &str = "status:connected";
/// Bus topic published when the connection is lost or explicitly closed.
pub const STATUS_DISCONNECTED: &str = "status:disconnected";
/// Bus topic published when a connect attempt fails.
pub const STATUS_ERROR: &str = "status:error";

/// Trait for getting the bus topic name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// Connection status changes published by the Connection Manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatusEvent {
    Connected { session_id: Option<String> },
    Disconnected { reason: String },
    Error { error: String },
}

impl StatusEvent {
    /// Payload carried on the bus.
    pub fn payload(&self) -> Value {
        // Plain structs of strings always serialize
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl EventType for StatusEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StatusEvent::Connected { .. } => STATUS_CONNECTED,
            StatusEvent::Disconnected { .. } => STATUS_DISCONNECTED,
            StatusEvent::Error { .. } => STATUS_ERROR,
        }
    }
}
