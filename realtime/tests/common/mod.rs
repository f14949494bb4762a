#![allow(dead_code)]

use async_trait::async_trait;
use events::{Event, EventBus};
use realtime::error::{connect_failure, Error};
use realtime::transport::{Transport, TransportConnection, TransportEvent};
use realtime::ConnectionState;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::Instant;

/// What the next `connect()` call does.
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    /// Succeed with the given session id.
    Accept(Option<String>),
    /// Fail with the given message.
    Refuse(String),
    /// Never resolve.
    Hang,
    /// Succeed once [`ScriptedTransport::open_gate`] is called.
    Gated(Option<String>),
}

/// In-memory transport whose connect outcomes are scripted by the test.
#[derive(Clone)]
pub struct ScriptedTransport {
    inner: Arc<Inner>,
}

struct Inner {
    script: Mutex<VecDeque<ConnectOutcome>>,
    fallback: ConnectOutcome,
    attempts: Mutex<Vec<Instant>>,
    live: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    gate: Notify,
}

impl ScriptedTransport {
    pub fn new(fallback: ConnectOutcome) -> Self {
        Self {
            inner: Arc::new(Inner {
                script: Mutex::new(VecDeque::new()),
                fallback,
                attempts: Mutex::new(Vec::new()),
                live: Mutex::new(None),
                gate: Notify::new(),
            }),
        }
    }

    /// Every unscripted attempt succeeds.
    pub fn accepting() -> Self {
        Self::new(ConnectOutcome::Accept(None))
    }

    /// Every unscripted attempt fails.
    pub fn refusing() -> Self {
        Self::new(ConnectOutcome::Refuse("connection refused".to_string()))
    }

    pub fn push(&self, outcome: ConnectOutcome) -> &Self {
        self.inner.script.lock().unwrap().push_back(outcome);
        self
    }

    pub fn connect_count(&self) -> usize {
        self.inner.attempts.lock().unwrap().len()
    }

    pub fn attempt_times(&self) -> Vec<Instant> {
        self.inner.attempts.lock().unwrap().clone()
    }

    pub fn open_gate(&self) {
        self.inner.gate.notify_one();
    }

    /// Deliver an inbound message on the live connection.
    pub fn send(&self, topic: &str, payload: Value) -> bool {
        self.deliver(TransportEvent::Message {
            topic: topic.to_string(),
            payload,
        })
    }

    /// Make the live connection drop.
    pub fn drop_connection(&self, reason: &str) -> bool {
        self.deliver(TransportEvent::Dropped {
            reason: reason.to_string(),
        })
    }

    fn deliver(&self, event: TransportEvent) -> bool {
        match self.inner.live.lock().unwrap().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    fn accept(&self, session_id: Option<String>) -> ScriptedConnection {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.inner.live.lock().unwrap() = Some(tx);
        ScriptedConnection { session_id, rx }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Connection = ScriptedConnection;

    async fn connect(&self) -> Result<ScriptedConnection, Error> {
        self.inner.attempts.lock().unwrap().push(Instant::now());
        let outcome = self
            .inner
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.inner.fallback.clone());

        match outcome {
            ConnectOutcome::Accept(session_id) => Ok(self.accept(session_id)),
            ConnectOutcome::Refuse(message) => Err(connect_failure(&message)),
            ConnectOutcome::Hang => std::future::pending().await,
            ConnectOutcome::Gated(session_id) => {
                self.inner.gate.notified().await;
                Ok(self.accept(session_id))
            }
        }
    }
}

pub struct ScriptedConnection {
    session_id: Option<String>,
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
impl TransportConnection for ScriptedConnection {
    fn session_id(&self) -> Option<String> {
        self.session_id.clone()
    }

    async fn next_event(&mut self) -> TransportEvent {
        self.rx.recv().await.unwrap_or(TransportEvent::Dropped {
            reason: "test transport closed".to_string(),
        })
    }
}

/// Record every payload published on `topic`.
pub fn record(bus: &EventBus, topic: &str) -> Arc<Mutex<Vec<Value>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(topic, move |event: &Event| -> Result<(), events::Error> {
        sink.lock().unwrap().push(event.payload.clone());
        Ok(())
    });
    seen
}

/// Wait (in virtual time) until the state satisfies `predicate`.
pub async fn wait_for_state<F>(rx: &mut watch::Receiver<ConnectionState>, predicate: F) -> ConnectionState
where
    F: FnMut(&ConnectionState) -> bool,
{
    tokio::time::timeout(Duration::from_secs(600), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for connection state")
        .expect("manager dropped")
        .clone()
}

/// Let spawned tasks run without crossing any backoff deadline.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Assert consecutive gaps between instants, with a little slack for tick rounding.
pub fn assert_gaps(times: &[Instant], expected: &[Duration]) {
    assert_eq!(
        times.len(),
        expected.len() + 1,
        "expected {} attempts, saw {}",
        expected.len() + 1,
        times.len()
    );
    for (pair, want) in times.windows(2).zip(expected) {
        let gap = pair[1] - pair[0];
        assert!(
            gap >= *want && gap <= *want + Duration::from_millis(5),
            "gap {:?} should be about {:?}",
            gap,
            want
        );
    }
}
