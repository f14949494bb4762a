use crate::backoff::Backoff;
use crate::connection::{ConnectionConfig, ConnectionState, ConnectionStatus, Transition};
use crate::error::{connect_timeout, invalid_transition, transport_dropped, Error};
use crate::message::{EventType, StatusEvent};
use crate::transport::{Transport, TransportConnection, TransportEvent};
use events::{EventBus, LifecycleNotifier, LifecycleState};
use log::*;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time;

/// Reason published on `status:disconnected` after an explicit `disconnect()`.
pub const CLIENT_DISCONNECT_REASON: &str = "client disconnect";

/// Transitions kept for receivers of [`Manager::transitions`] that fall behind.
const TRANSITION_BUFFER: usize = 256;

/// Owns the single realtime connection, its state machine and its
/// reconnection policy.
///
/// `initialize()` starts a session: a driver task that connects, republishes
/// inbound payload events on the bus, and reconnects with exponential backoff
/// whenever the connection fails or drops. `disconnect()` ends the session.
/// Neither returns an error; connection health is observed through
/// [`state`](Self::state), [`watch_state`](Self::watch_state) or the
/// `status:*` bus topics.
///
/// Both calls must be made from within a Tokio runtime.
pub struct Manager<T: Transport> {
    shared: Arc<Shared<T>>,
}

struct Shared<T: Transport> {
    transport: T,
    bus: EventBus,
    lifecycle: Arc<dyn LifecycleNotifier>,
    config: ConnectionConfig,
    slot: Mutex<Slot>,
    /// Written only while `slot` is held
    state_tx: watch::Sender<ConnectionState>,
    transitions_tx: broadcast::Sender<Transition>,
}

/// Session bookkeeping guarded by one lock.
struct Slot {
    /// Bumped whenever a session starts or ends. Work tagged with an older
    /// epoch belongs to a torn-down session and is discarded.
    epoch: u64,
    driver: Option<JoinHandle<()>>,
}

impl<T: Transport> Manager<T> {
    pub fn new(
        transport: T,
        bus: EventBus,
        lifecycle: Arc<dyn LifecycleNotifier>,
        config: ConnectionConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::NotInitialized);
        let (transitions_tx, _) = broadcast::channel(TRANSITION_BUFFER);
        Self {
            shared: Arc::new(Shared {
                transport,
                bus,
                lifecycle,
                config,
                slot: Mutex::new(Slot {
                    epoch: 0,
                    driver: None,
                }),
                state_tx,
                transitions_tx,
            }),
        }
    }

    /// Snapshot of the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state_tx.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Receiver of every applied transition, in the order applied.
    ///
    /// Unlike [`watch_state`](Self::watch_state) no intermediate state is
    /// skipped. A receiver more than a few hundred transitions behind gets
    /// `RecvError::Lagged`.
    pub fn transitions(&self) -> broadcast::Receiver<Transition> {
        self.shared.transitions_tx.subscribe()
    }

    /// Start connecting. A no-op unless the state is `NotInitialized`, so
    /// repeated calls never open a second transport.
    pub fn initialize(&self) {
        let mut slot = self.shared.slot();

        let current = self.shared.status();
        if current != ConnectionStatus::NotInitialized {
            debug!("initialize() ignored while {}", current);
            return;
        }

        slot.epoch += 1;
        let epoch = slot.epoch;
        self.shared.apply(ConnectionState::Connecting);

        let shared = Arc::clone(&self.shared);
        let lifecycle = self.shared.lifecycle.subscribe();
        slot.driver = Some(tokio::spawn(drive(shared, epoch, lifecycle)));
    }

    /// Close the connection, cancel every pending timer and return to
    /// `NotInitialized`. No reconnect is scheduled afterwards. A no-op when
    /// already `NotInitialized`.
    pub fn disconnect(&self) {
        {
            let mut slot = self.shared.slot();

            let current = self.shared.status();
            if current == ConnectionStatus::NotInitialized {
                debug!("disconnect() ignored while {}", current);
                return;
            }

            slot.epoch += 1;
            if let Some(driver) = slot.driver.take() {
                // Dropping the driver's future closes the transport and its timers
                driver.abort();
            }
            self.shared.apply(ConnectionState::NotInitialized);
        }

        self.shared.publish(StatusEvent::Disconnected {
            reason: CLIENT_DISCONNECT_REASON.to_string(),
        });
    }
}

impl<T: Transport> Drop for Manager<T> {
    fn drop(&mut self) {
        let mut slot = self.shared.slot();
        slot.epoch += 1;
        if let Some(driver) = slot.driver.take() {
            driver.abort();
        }
        if self.shared.status() != ConnectionStatus::NotInitialized {
            self.shared.apply(ConnectionState::NotInitialized);
        }
    }
}

impl<T: Transport> Shared<T> {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self) -> ConnectionStatus {
        self.state_tx.borrow().status()
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.slot().epoch == epoch
    }

    /// Apply `next` if the state machine has the edge. Caller holds `slot`.
    fn apply(&self, next: ConnectionState) -> bool {
        let current = self.status();
        let target = next.status();

        if !current.can_transition_to(target) {
            debug!(
                "Ignoring {}",
                invalid_transition(&format!("{} -> {}", current, target))
            );
            return false;
        }

        info!("Connection state {} -> {}", current, target);
        self.state_tx.send_replace(next);
        // No receivers is fine
        let _ = self.transitions_tx.send(Transition {
            from: current,
            to: target,
        });
        true
    }

    /// Apply `next` on behalf of the session identified by `epoch`.
    ///
    /// Returns `false` when the session has been torn down or the state has
    /// moved on, in which case the caller's result is stale and discarded.
    fn transition(&self, epoch: u64, next: ConnectionState) -> bool {
        let slot = self.slot();
        if slot.epoch != epoch {
            trace!(
                "Discarding {} transition from torn-down session {}",
                next.status(),
                epoch
            );
            return false;
        }
        self.apply(next)
    }

    fn publish(&self, event: StatusEvent) {
        self.bus.publish(event.event_type(), event.payload());
    }

    async fn open(&self) -> Result<T::Connection, Error> {
        let timeout = self.config.connect_timeout;
        match time::timeout(timeout, self.transport.connect()).await {
            Ok(result) => result,
            Err(_) => Err(connect_timeout(&format!(
                "no connection after {:?}",
                timeout
            ))),
        }
    }

    /// Republish inbound events until the connection drops.
    async fn pump(&self, epoch: u64, connection: &mut T::Connection) -> Option<String> {
        loop {
            match connection.next_event().await {
                TransportEvent::Message { topic, payload } => {
                    if !self.is_current(epoch) {
                        return None;
                    }
                    trace!("Republishing inbound event '{}'", topic);
                    self.bus.publish(&topic, payload);
                }
                TransportEvent::Dropped { reason } => return Some(reason),
            }
        }
    }
}

/// Session driver: connect, pump, back off, repeat until aborted or stale.
///
/// `lifecycle` is subscribed when the session starts, not when the task first
/// runs, so no lifecycle change in between is missed.
async fn drive<T: Transport>(
    shared: Arc<Shared<T>>,
    epoch: u64,
    mut lifecycle: watch::Receiver<LifecycleState>,
) {
    let mut backoff = Backoff::new(shared.config.backoff.clone());

    loop {
        match shared.open().await {
            Ok(mut connection) => {
                let session_id = connection.session_id();
                let connected = ConnectionState::Connected {
                    session_id: session_id.clone(),
                };
                if !shared.transition(epoch, connected) {
                    return;
                }
                backoff.reset();
                shared.publish(StatusEvent::Connected { session_id });

                let Some(reason) = shared.pump(epoch, &mut connection).await else {
                    return;
                };
                drop(connection);

                warn!("Realtime connection lost: {}", transport_dropped(&reason));
                if !shared.transition(epoch, ConnectionState::Disconnected) {
                    return;
                }
                shared.publish(StatusEvent::Disconnected { reason });
            }
            Err(e) => {
                warn!("Connect attempt failed: {}", e);
                let last_error = e.to_string();
                let failed = ConnectionState::Error {
                    last_error: last_error.clone(),
                };
                if !shared.transition(epoch, failed) {
                    return;
                }
                shared.publish(StatusEvent::Error { error: last_error });
            }
        }

        let delay = backoff.next_delay();
        info!(
            "Reconnecting in {:?} (attempt {})",
            delay,
            backoff.attempt()
        );
        wait_before_retry(delay, &mut lifecycle).await;

        if !shared.transition(epoch, ConnectionState::Connecting) {
            return;
        }
    }
}

/// Wait out a backoff delay.
///
/// Retries are suspended while the app is backgrounded. A background to
/// foreground transition ends the wait immediately, even if the delay has not
/// elapsed yet. If the notifier goes away the plain delay applies.
async fn wait_before_retry(delay: Duration, lifecycle: &mut watch::Receiver<LifecycleState>) {
    let sleep = time::sleep(delay);
    tokio::pin!(sleep);
    let mut elapsed = false;

    loop {
        let active = *lifecycle.borrow_and_update() == LifecycleState::Active;
        if elapsed && active {
            return;
        }
        if elapsed {
            debug!("Reconnect suspended while app is in background");
        }

        tokio::select! {
            _ = &mut sleep, if !elapsed => {
                elapsed = true;
            }
            changed = lifecycle.changed() => {
                if changed.is_err() {
                    if !elapsed {
                        (&mut sleep).await;
                    }
                    return;
                }
                if !active && *lifecycle.borrow() == LifecycleState::Active {
                    debug!("App foregrounded, retrying immediately");
                    return;
                }
            }
        }
    }
}
