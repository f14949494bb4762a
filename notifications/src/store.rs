use crate::notification::{Notification, NotificationAction, TOPICS};
use crate::reducer::reduce;
use chrono::{DateTime, Utc};
use events::{Event, EventBus, SubscriptionId};
use log::*;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

/// In-memory notification collection driven by bus events.
///
/// Cloning is cheap; all clones share the same collection. The store only
/// changes when a [`NotificationAction`] arrives through the bus it is
/// [`attach`](Self::attach)ed to. There is no direct mutation API:
///
/// ```compile_fail
/// use notifications::{NotificationAction, NotificationStore};
///
/// let store = NotificationStore::new();
/// store.dispatch(NotificationAction::Clear);
/// ```
#[derive(Clone, Default)]
pub struct NotificationStore {
    notifications: Arc<RwLock<Vec<Notification>>>,
}

/// Keeps a store subscribed to the notification topics. Dropping it
/// unsubscribes all of them.
#[must_use = "dropping the guard detaches the store from the bus"]
pub struct NotificationSubscriptions {
    bus: EventBus,
    subscriptions: Vec<SubscriptionId>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe this store to every notification topic on `bus`.
    ///
    /// A malformed payload fails the handler, which the bus logs; the store
    /// is left untouched.
    pub fn attach(&self, bus: &EventBus) -> NotificationSubscriptions {
        let subscriptions = TOPICS
            .iter()
            .map(|topic| {
                let store = self.clone();
                bus.subscribe(*topic, move |event: &Event| -> Result<(), events::Error> {
                    let action = NotificationAction::from_event(event)?;
                    store.dispatch(action);
                    Ok(())
                })
            })
            .collect();

        NotificationSubscriptions {
            bus: bus.clone(),
            subscriptions,
        }
    }

    /// Apply one action. Returns whether the collection changed.
    pub(crate) fn dispatch(&self, action: NotificationAction) -> bool {
        let topic = action.topic();
        let mut notifications = self
            .notifications
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let changed = reduce(&mut notifications, action);

        if changed {
            debug!("Applied {} ({} notification(s))", topic, notifications.len());
        } else {
            trace!("{} left notifications unchanged", topic);
        }
        changed
    }

    /// Snapshot of the collection, most recent first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Notification> {
        self.read().iter().find(|n| n.id == id).cloned()
    }

    pub fn unread_count(&self) -> usize {
        self.read().iter().filter(|n| !n.is_read).count()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Notification>> {
        self.notifications
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationSubscriptions {
    /// Number of topics still subscribed.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl Drop for NotificationSubscriptions {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
        debug!("Notification store detached from bus");
    }
}

/// Announce a new notification received now.
pub fn publish_received(bus: &EventBus, id: impl Into<String>, payload: Value) {
    publish(bus, NotificationAction::Received(Notification::new(id, payload)));
}

/// Announce a new notification with an explicit receive time.
pub fn publish_received_at(
    bus: &EventBus,
    id: impl Into<String>,
    payload: Value,
    received_at: DateTime<Utc>,
) {
    let mut notification = Notification::new(id, payload);
    notification.received_at = received_at;
    publish(bus, NotificationAction::Received(notification));
}

pub fn publish_read(bus: &EventBus, id: impl Into<String>) {
    publish(bus, NotificationAction::Read { id: id.into() });
}

pub fn publish_read_all(bus: &EventBus) {
    publish(bus, NotificationAction::ReadAll);
}

pub fn publish_remove(bus: &EventBus, id: impl Into<String>) {
    publish(bus, NotificationAction::Remove { id: id.into() });
}

pub fn publish_clear(bus: &EventBus) {
    publish(bus, NotificationAction::Clear);
}

fn publish(bus: &EventBus, action: NotificationAction) {
    bus.publish(action.topic(), action.payload());
}
