use crate::notification::{Notification, NotificationAction};

/// Apply `action` to `notifications` and report whether anything changed.
///
/// The collection stays unique by id and most-recent-first. A `Received` for
/// an id already present is rejected; every other action is a no-op when its
/// target is missing.
pub fn reduce(notifications: &mut Vec<Notification>, action: NotificationAction) -> bool {
    match action {
        NotificationAction::Received(notification) => {
            if notifications.iter().any(|n| n.id == notification.id) {
                return false;
            }
            notifications.insert(0, notification);
            true
        }
        NotificationAction::Read { id } => match notifications.iter_mut().find(|n| n.id == id) {
            Some(notification) if !notification.is_read => {
                notification.is_read = true;
                true
            }
            _ => false,
        },
        NotificationAction::ReadAll => {
            let mut changed = false;
            for notification in notifications.iter_mut().filter(|n| !n.is_read) {
                notification.is_read = true;
                changed = true;
            }
            changed
        }
        NotificationAction::Remove { id } => {
            let before = notifications.len();
            notifications.retain(|n| n.id != id);
            notifications.len() != before
        }
        NotificationAction::Clear => {
            let changed = !notifications.is_empty();
            notifications.clear();
            changed
        }
    }
}
