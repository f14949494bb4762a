use crate::error::Error;
use dashmap::DashMap;
use log::*;
use serde_json::Value;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use uuid::Uuid;

/// A single published event: a free-form topic plus an opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub topic: String,
    pub payload: Value,
}

/// Unique identifier for a subscription (bus-generated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trait for handling bus events.
/// Implementations can perform side effects like updating stores,
/// triggering refreshes, logging, etc.
///
/// Any `Fn(&Event) -> Result<(), Error>` closure is a handler.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event) -> Result<(), Error>;
}

impl<F> EventHandler for F
where
    F: Fn(&Event) -> Result<(), Error> + Send + Sync,
{
    fn handle(&self, event: &Event) -> Result<(), Error> {
        self(event)
    }
}

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
}

/// Subscription registry with dual indices
struct Registry {
    /// Primary storage: handlers per topic, in subscription order
    topics: DashMap<String, Vec<Subscriber>>,

    /// Secondary index: subscription_id -> topic, for O(1) removal
    index: DashMap<SubscriptionId, String>,
}

/// Process-wide publish/subscribe registry keyed by topic.
///
/// Cloning is cheap; all clones share the same registry. Delivery is
/// synchronous: `publish` returns once every handler subscribed to the topic
/// has run. Events are fire-and-forget, so a handler subscribed after a
/// publish never sees it.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                topics: DashMap::new(),
                index: DashMap::new(),
            }),
        }
    }

    /// Subscribe a handler to a topic and return its handle.
    pub fn subscribe<H>(&self, topic: impl Into<String>, handler: H) -> SubscriptionId
    where
        H: EventHandler + 'static,
    {
        self.subscribe_arc(topic, Arc::new(handler))
    }

    /// Subscribe an already shared handler to a topic.
    pub fn subscribe_arc(
        &self,
        topic: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        let topic = topic.into();
        let id = SubscriptionId::new();

        // Index first so the id is always resolvable once it is visible in a topic
        self.registry.index.insert(id, topic.clone());
        self.registry
            .topics
            .entry(topic.clone())
            .or_default()
            .push(Subscriber { id, handler });

        debug!("Subscribed {} to topic '{}'", id, topic);
        id
    }

    /// Remove a subscription. Returns `true` only for the call that removed it;
    /// removing an already removed subscription is a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Some((_, topic)) = self.registry.index.remove(&id) else {
            trace!("Subscription {} already removed", id);
            return false;
        };

        if let Some(mut subscribers) = self.registry.topics.get_mut(&topic) {
            subscribers.retain(|s| s.id != id);
        }
        // Clean up empty topic entries
        self.registry
            .topics
            .remove_if(&topic, |_, subscribers| subscribers.is_empty());

        debug!("Unsubscribed {} from topic '{}'", id, topic);
        true
    }

    /// Publish an event to every handler currently subscribed to `topic`.
    ///
    /// Handlers run in subscription order. A handler that returns an error or
    /// panics is logged and skipped; the remaining handlers still run.
    pub fn publish(&self, topic: &str, payload: Value) {
        // Snapshot so handlers may subscribe, unsubscribe or publish re-entrantly
        let subscribers = match self.registry.topics.get(topic) {
            Some(entry) => entry.value().clone(),
            None => {
                trace!("No subscribers for topic '{}'", topic);
                return;
            }
        };

        let event = Event {
            topic: topic.to_string(),
            payload,
        };

        for subscriber in subscribers.iter() {
            // Skip handlers removed by an earlier handler during this fan-out
            if !self.registry.index.contains_key(&subscriber.id) {
                continue;
            }

            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| subscriber.handler.handle(&event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(
                        "Handler {} failed for topic '{}': {}",
                        subscriber.id, topic, e
                    );
                }
                Err(_) => {
                    error!("Handler {} panicked for topic '{}'", subscriber.id, topic);
                }
            }
        }
    }

    /// Number of live subscriptions on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry
            .topics
            .get(topic)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    /// Number of topics with at least one subscription.
    pub fn topic_count(&self) -> usize {
        self.registry.topics.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
