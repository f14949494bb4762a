use crate::action::{RefreshAction, Trigger};
use crate::error::{invalid_trigger, Error};
use dashmap::DashMap;
use events::{Event, EventBus, LifecycleNotifier, LifecycleState, SubscriptionId};
use futures_util::FutureExt;
use log::*;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use uuid::Uuid;

/// Unique identifier for a refresh registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RegistrationId(Uuid);

impl RegistrationId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runs caller-supplied refresh actions when their triggers fire.
///
/// Each registration gets one worker task. Triggers only ever record that a
/// refresh is owed, so at most one invocation of an action is in flight and
/// any number of triggers arriving meanwhile collapse into a single follow-up
/// run.
///
/// `register` must be called from within a Tokio runtime. Dropping the
/// coordinator tears down every registration it still holds.
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    bus: EventBus,
    lifecycle: Arc<dyn LifecycleNotifier>,
    registrations: DashMap<RegistrationId, Registration>,
}

/// Refresh owed to one registration.
///
/// `pending` is set by the first trigger after a run starts and cleared by the
/// worker when it picks the refresh up. Only the trigger that sets it wakes the
/// worker, so any burst collapses into one run.
#[derive(Default)]
struct Owed {
    pending: AtomicBool,
    notify: Notify,
}

impl Owed {
    fn mark(&self) {
        if !self.pending.swap(true, Ordering::SeqCst) {
            self.notify.notify_one();
        }
    }

    async fn take(&self) {
        self.notify.notified().await;
        self.pending.store(false, Ordering::SeqCst);
    }
}

/// Every listener attached for one registration, released together.
struct Registration {
    subscriptions: Vec<SubscriptionId>,
    tasks: Vec<JoinHandle<()>>,
}

/// Handle to a live registration.
///
/// Dropping the handle unregisters it.
#[must_use = "dropping the handle unregisters the refresh"]
pub struct RefreshHandle {
    id: RegistrationId,
    owed: Arc<Owed>,
    coordinator: Weak<Inner>,
}

impl Coordinator {
    pub fn new(bus: EventBus, lifecycle: Arc<dyn LifecycleNotifier>) -> Self {
        Self {
            inner: Arc::new(Inner {
                bus,
                lifecycle,
                registrations: DashMap::new(),
            }),
        }
    }

    /// Attach `action` to every trigger in `triggers`.
    ///
    /// Nothing is attached when any trigger is invalid. A registration with no
    /// triggers only runs through [`RefreshHandle::trigger`].
    pub fn register<A>(
        &self,
        action: A,
        triggers: impl IntoIterator<Item = Trigger>,
    ) -> Result<RefreshHandle, Error>
    where
        A: RefreshAction,
    {
        let triggers: Vec<Trigger> = triggers.into_iter().collect();
        for trigger in &triggers {
            if let Trigger::Interval(period) = trigger {
                if period.is_zero() {
                    return Err(invalid_trigger("interval must be greater than zero"));
                }
            }
        }

        let id = RegistrationId::new();
        let owed = Arc::new(Owed::default());
        let mut registration = Registration {
            subscriptions: Vec::new(),
            tasks: vec![tokio::spawn(run_worker(
                id,
                Arc::new(action),
                Arc::clone(&owed),
            ))],
        };

        for trigger in triggers {
            match trigger {
                Trigger::AppForegrounded => {
                    let mut lifecycle = self.inner.lifecycle.subscribe();
                    let initial = *lifecycle.borrow_and_update();
                    registration.tasks.push(tokio::spawn(watch_foreground(
                        lifecycle,
                        initial,
                        Arc::clone(&owed),
                    )));
                }
                Trigger::Topic(topic) => {
                    let owed = Arc::clone(&owed);
                    let subscription = self.inner.bus.subscribe(
                        topic,
                        move |_event: &Event| -> Result<(), events::Error> {
                            owed.mark();
                            Ok(())
                        },
                    );
                    registration.subscriptions.push(subscription);
                }
                Trigger::Interval(period) => {
                    registration
                        .tasks
                        .push(tokio::spawn(tick(period, Arc::clone(&owed))));
                }
            }
        }

        info!(
            "Registered refresh {} ({} topic(s), {} task(s))",
            id,
            registration.subscriptions.len(),
            registration.tasks.len()
        );
        self.inner.registrations.insert(id, registration);

        Ok(RefreshHandle {
            id,
            owed,
            coordinator: Arc::downgrade(&self.inner),
        })
    }

    /// Release every listener of `handle`. Returns `false` if it was already
    /// unregistered.
    pub fn unregister(&self, handle: &RefreshHandle) -> bool {
        self.inner.teardown(handle.id)
    }

    /// Number of live registrations.
    pub fn registration_count(&self) -> usize {
        self.inner.registrations.len()
    }
}

impl Inner {
    fn teardown(&self, id: RegistrationId) -> bool {
        match self.registrations.remove(&id) {
            Some((_, registration)) => {
                registration.release(&self.bus);
                info!("Unregistered refresh {}", id);
                true
            }
            None => false,
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let ids: Vec<RegistrationId> = self.registrations.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.teardown(id);
        }
    }
}

impl Registration {
    fn release(self, bus: &EventBus) {
        for subscription in self.subscriptions {
            bus.unsubscribe(subscription);
        }
        for task in self.tasks {
            task.abort();
        }
    }
}

impl RefreshHandle {
    /// Request a refresh by hand, coalesced like any other trigger.
    pub fn trigger(&self) {
        self.owed.mark();
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.coordinator.upgrade() {
            inner.teardown(self.id);
        }
    }
}

/// Run the action once per owed refresh.
async fn run_worker(id: RegistrationId, action: Arc<dyn RefreshAction>, owed: Arc<Owed>) {
    loop {
        owed.take().await;
        debug!("Running refresh {}", id);

        match AssertUnwindSafe(action.refresh()).catch_unwind().await {
            Ok(Ok(())) => trace!("Refresh {} completed", id),
            Ok(Err(e)) => warn!("Refresh {} failed: {}", id, e),
            Err(_) => error!("Refresh {} panicked", id),
        }
    }
}

/// `initial` is the state seen at registration, so a transition made before
/// this task first runs still counts.
async fn watch_foreground(
    mut lifecycle: watch::Receiver<LifecycleState>,
    initial: LifecycleState,
    owed: Arc<Owed>,
) {
    let mut previous = initial;
    while lifecycle.changed().await.is_ok() {
        let current = *lifecycle.borrow_and_update();
        if previous == LifecycleState::Background && current == LifecycleState::Active {
            owed.mark();
        }
        previous = current;
    }
}

async fn tick(period: Duration, owed: Arc<Owed>) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        owed.mark();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{action_failed, ErrorKind};
    use events::Lifecycle;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    fn coordinator() -> (Coordinator, EventBus, Lifecycle) {
        let bus = EventBus::new();
        let lifecycle = Lifecycle::default();
        let coordinator = Coordinator::new(bus.clone(), Arc::new(lifecycle.clone()));
        (coordinator, bus, lifecycle)
    }

    /// Action that counts invocations and takes `duration` to finish.
    fn counting(
        duration: Duration,
    ) -> (
        Arc<AtomicUsize>,
        Arc<AtomicUsize>,
        impl Fn() -> futures_util::future::BoxFuture<'static, Result<(), Error>> + Send + Sync + 'static,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicUsize::new(0));
        let (calls_out, peak_out) = (Arc::clone(&calls), Arc::clone(&peak));
        let action = move || {
            let calls = Arc::clone(&calls);
            let peak = Arc::clone(&peak);
            let running = Arc::clone(&running);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(duration).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        };
        (calls_out, peak_out, action)
    }

    async fn settle() {
        sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_triggers_coalesce_into_one_follow_up() {
        let (coordinator, bus, _lifecycle) = coordinator();
        let (calls, peak, action) = counting(Duration::from_millis(500));
        let _handle = coordinator
            .register(action, [Trigger::topic("ride:updated")])
            .unwrap();

        bus.publish("ride:updated", json!({}));
        sleep(Duration::from_millis(100)).await;
        bus.publish("ride:updated", json!({}));
        sleep(Duration::from_millis(100)).await;
        bus.publish("ride:updated", json!({}));
        sleep(Duration::from_secs(2)).await;

        assert_eq!(
            calls.load(Ordering::SeqCst),
            2,
            "one in-flight run plus one coalesced follow-up"
        );
        assert_eq!(peak.load(Ordering::SeqCst), 1, "runs must never overlap");
    }

    #[tokio::test(start_paused = true)]
    async fn test_simultaneous_triggers_run_once() {
        let (coordinator, bus, _lifecycle) = coordinator();
        let (calls, _peak, action) = counting(Duration::from_millis(500));
        let _handle = coordinator
            .register(
                action,
                [Trigger::topic("ride:updated"), Trigger::topic("chat:message")],
            )
            .unwrap();

        bus.publish("ride:updated", json!({}));
        bus.publish("chat:message", json!({}));
        sleep(Duration::from_secs(2)).await;

        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "triggers arriving before the run starts share it"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_right_after_register_triggers() {
        let bus = EventBus::new();
        let lifecycle = Lifecycle::new(LifecycleState::Background);
        let coordinator = Coordinator::new(bus, Arc::new(lifecycle.clone()));
        let (calls, _peak, action) = counting(Duration::ZERO);
        let _handle = coordinator
            .register(action, [Trigger::AppForegrounded])
            .unwrap();

        lifecycle.set_active();
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_after_completion_runs_again() {
        let (coordinator, bus, _lifecycle) = coordinator();
        let (calls, _peak, action) = counting(Duration::from_millis(10));
        let _handle = coordinator
            .register(action, [Trigger::topic("ride:updated")])
            .unwrap();

        for _ in 0..3 {
            bus.publish("ride:updated", json!({}));
            sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_any_trigger_kind_runs_the_action() {
        let (coordinator, bus, lifecycle) = coordinator();
        let (calls, _peak, action) = counting(Duration::ZERO);
        let handle = coordinator
            .register(
                action,
                [
                    Trigger::AppForegrounded,
                    Trigger::topic("ride:updated"),
                    Trigger::topic("chat:message"),
                ],
            )
            .unwrap();

        bus.publish("chat:message", json!({}));
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        bus.publish("ride:updated", json!({}));
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        lifecycle.set_background();
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2, "going to background is not a trigger");
        lifecycle.set_active();
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        handle.trigger();
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        bus.publish("unrelated", json!({}));
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_trigger_ticks_after_each_period() {
        let (coordinator, _bus, _lifecycle) = coordinator();
        let (calls, _peak, action) = counting(Duration::ZERO);
        let _handle = coordinator
            .register(action, [Trigger::Interval(Duration::from_secs(1))])
            .unwrap();

        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0, "no tick at registration");
        sleep(Duration::from_millis(3_500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_action_stays_registered() {
        let (coordinator, bus, _lifecycle) = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _handle = coordinator
            .register(
                move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err::<(), Error>(action_failed("backend unavailable"))
                    }
                },
                [Trigger::topic("ride:updated")],
            )
            .unwrap();

        bus.publish("ride:updated", json!({}));
        settle().await;
        bus.publish("ride:updated", json!({}));
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.registration_count(), 1);
        assert_eq!(bus.subscriber_count("ride:updated"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_action_is_contained() {
        let (coordinator, bus, _lifecycle) = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _handle = coordinator
            .register(
                move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                            panic!("refresh blew up");
                        }
                        Ok::<(), Error>(())
                    }
                },
                [Trigger::topic("ride:updated")],
            )
            .unwrap();

        bus.publish("ride:updated", json!({}));
        settle().await;
        bus.publish("ride:updated", json!({}));
        settle().await;

        assert_eq!(
            calls.load(Ordering::SeqCst),
            2,
            "worker should survive a panicking run"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregister_releases_every_listener() {
        let (coordinator, bus, lifecycle) = coordinator();
        let (calls, _peak, action) = counting(Duration::ZERO);
        let handle = coordinator
            .register(
                action,
                [
                    Trigger::AppForegrounded,
                    Trigger::topic("ride:updated"),
                    Trigger::topic("chat:message"),
                    Trigger::Interval(Duration::from_secs(1)),
                ],
            )
            .unwrap();
        assert_eq!(bus.subscriber_count("ride:updated"), 1);
        assert_eq!(bus.subscriber_count("chat:message"), 1);

        assert!(coordinator.unregister(&handle));
        assert!(!coordinator.unregister(&handle), "second unregister is a no-op");
        assert_eq!(coordinator.registration_count(), 0);
        assert_eq!(bus.subscriber_count("ride:updated"), 0);
        assert_eq!(bus.subscriber_count("chat:message"), 0);

        bus.publish("ride:updated", json!({}));
        lifecycle.set_background();
        settle().await;
        lifecycle.set_active();
        handle.trigger();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(
            calls.load(Ordering::SeqCst),
            0,
            "no listener may fire after unregister"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_unregisters() {
        let (coordinator, bus, _lifecycle) = coordinator();
        let (calls, _peak, action) = counting(Duration::ZERO);
        let handle = coordinator
            .register(
                action,
                [
                    Trigger::topic("ride:updated"),
                    Trigger::Interval(Duration::from_secs(1)),
                ],
            )
            .unwrap();

        drop(handle);
        assert_eq!(coordinator.registration_count(), 0);
        assert_eq!(bus.subscriber_count("ride:updated"), 0);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_coordinator_tears_down_registrations() {
        let (coordinator, bus, _lifecycle) = coordinator();
        let (calls, _peak, first) = counting(Duration::ZERO);
        let (_, _, second) = counting(Duration::ZERO);
        let handle = coordinator
            .register(first, [Trigger::topic("ride:updated")])
            .unwrap();
        let _other = coordinator
            .register(second, [Trigger::topic("chat:message")])
            .unwrap();

        drop(coordinator);
        assert_eq!(bus.subscriber_count("ride:updated"), 0);
        assert_eq!(bus.subscriber_count("chat:message"), 0);

        handle.trigger();
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_rejected_without_side_effects() {
        let (coordinator, bus, _lifecycle) = coordinator();
        let (_calls, _peak, action) = counting(Duration::ZERO);

        let result = coordinator.register(
            action,
            [
                Trigger::topic("ride:updated"),
                Trigger::Interval(Duration::ZERO),
            ],
        );

        match result {
            Err(e) => assert_eq!(e.error_kind, ErrorKind::InvalidTrigger),
            Ok(_) => panic!("zero interval should be rejected"),
        }
        assert_eq!(coordinator.registration_count(), 0);
        assert_eq!(bus.subscriber_count("ride:updated"), 0);
    }
}
