//! App foreground/background notifier.
//!
//! The host shell owns a [`Lifecycle`] and flips it as the app moves between
//! foreground and background. Components that care (the Connection Manager's
//! reconnect policy, the Auto-Refresh Coordinator's foreground trigger) depend
//! only on [`LifecycleNotifier`], so tests can drive them without a real host.

use log::*;
use std::sync::Arc;
use tokio::sync::watch;

/// The two states the host reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// App is in the foreground.
    Active,
    /// App is inactive or backgrounded.
    Background,
}

/// Source of lifecycle transitions.
pub trait LifecycleNotifier: Send + Sync {
    /// A receiver that observes the current state and every later change.
    fn subscribe(&self) -> watch::Receiver<LifecycleState>;
}

/// Host-side lifecycle notifier backed by a watch channel.
#[derive(Clone)]
pub struct Lifecycle {
    sender: Arc<watch::Sender<LifecycleState>>,
}

impl Lifecycle {
    pub fn new(initial: LifecycleState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn current(&self) -> LifecycleState {
        *self.sender.borrow()
    }

    pub fn set_active(&self) {
        self.set(LifecycleState::Active);
    }

    pub fn set_background(&self) {
        self.set(LifecycleState::Background);
    }

    /// Report a new state. Re-reporting the current state notifies nobody.
    pub fn set(&self, state: LifecycleState) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        if changed {
            info!("App lifecycle changed to {:?}", state);
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(LifecycleState::Active)
    }
}

impl LifecycleNotifier for Lifecycle {
    fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_updates_current_state() {
        let lifecycle = Lifecycle::default();
        assert_eq!(lifecycle.current(), LifecycleState::Active);

        lifecycle.set_background();
        assert_eq!(lifecycle.current(), LifecycleState::Background);
    }

    #[test]
    fn test_repeated_state_does_not_notify() {
        let lifecycle = Lifecycle::new(LifecycleState::Active);
        let mut rx = lifecycle.subscribe();
        rx.borrow_and_update();

        lifecycle.set_active();
        assert!(!rx.has_changed().unwrap(), "same state must not wake observers");

        lifecycle.set_background();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), LifecycleState::Background);
    }
}
