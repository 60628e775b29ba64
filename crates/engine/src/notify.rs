use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Emitted when this node adopts a new predecessor: the host application
/// should move ownership of keys in the arc `(predecessor.id, self_id]` to
/// `(ip, app_port)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncNotification {
    pub ip: String,
    pub app_port: u16,
}

/// Thread-safe FIFO of notifications: the engine pushes, the host
/// application polls.
///
/// spec.md describes "two mutexes (list + flag)" for this queue; the flag
/// collapses to an `AtomicBool` here, the same substitution the sibling
/// session crate makes for its own tick counter (`Timer`, an `AtomicU64`)
/// instead of a second mutex guarding a primitive.
#[derive(Default)]
pub struct NotificationQueue {
    queue: Mutex<VecDeque<SyncNotification>>,
    has_data: AtomicBool,
}

impl NotificationQueue {
    pub fn push(&self, notification: SyncNotification) {
        self.queue.lock().push_back(notification);
        self.has_data.store(true, Ordering::Release);
    }

    pub fn has_notification(&self) -> bool {
        self.has_data.load(Ordering::Acquire)
    }

    pub fn pop_notification(&self) -> Option<SyncNotification> {
        let mut queue = self.queue.lock();
        let item = queue.pop_front();

        if queue.is_empty() {
            self.has_data.store(false, Ordering::Release);
        }

        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_empty_until_pushed() {
        let queue = NotificationQueue::default();
        assert!(!queue.has_notification());

        queue.push(SyncNotification {
            ip: "10.0.0.1".into(),
            app_port: 9000,
        });

        assert!(queue.has_notification());
    }

    #[test]
    fn pop_drains_in_fifo_order_and_clears_flag() {
        let queue = NotificationQueue::default();
        queue.push(SyncNotification {
            ip: "10.0.0.1".into(),
            app_port: 9000,
        });
        queue.push(SyncNotification {
            ip: "10.0.0.2".into(),
            app_port: 9001,
        });

        assert_eq!(queue.pop_notification().unwrap().ip, "10.0.0.1");
        assert!(queue.has_notification());
        assert_eq!(queue.pop_notification().unwrap().ip, "10.0.0.2");
        assert!(!queue.has_notification());
        assert!(queue.pop_notification().is_none());
    }
}
