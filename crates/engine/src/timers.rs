use std::time::{Duration, Instant};

use ahash::HashMap;
use parking_lot::Mutex;

use crate::node_ref::NodeRef;

/// Messages that need at-least-once delivery (predecessor updates, lookups)
/// are retransmitted on this fixed interval until acknowledged. No
/// exponential backoff — the fixed interval is part of the contract.
pub const SEND_TIMEOUT: Duration = Duration::from_millis(1500);

struct Entry {
    recipient: NodeRef,
    payload: Vec<u8>,
    last_send: Instant,
}

/// A mapping from correlation key (search-term, or self id for the initial
/// join notification) to the peer and payload to retransmit until
/// acknowledged.
///
/// Grounded on the background-sweep idiom of the sibling session-manager
/// crate's expiry thread: a single lock guarding a hashed table, drained by
/// a periodic scan rather than per-entry timers.
#[derive(Default)]
pub struct SendTimers(Mutex<HashMap<u32, Entry>>);

impl SendTimers {
    /// Registers (or replaces) a retransmission entry for `key`.
    pub fn register(&self, key: u32, recipient: NodeRef, payload: Vec<u8>) {
        self.0.lock().insert(
            key,
            Entry {
                recipient,
                payload,
                last_send: Instant::now(),
            },
        );
    }

    /// Cancels the entry for `key`, if any (an acknowledgement arrived).
    pub fn cancel(&self, key: u32) {
        self.0.lock().remove(&key);
    }

    /// Returns `(recipient, payload)` for every entry whose last send is
    /// older than [`SEND_TIMEOUT`], refreshing its timestamp so it is only
    /// retransmitted once per sweep.
    pub fn due_for_retransmit(&self) -> Vec<(NodeRef, Vec<u8>)> {
        let now = Instant::now();
        let mut table = self.0.lock();

        table
            .values_mut()
            .filter(|entry| now.saturating_duration_since(entry.last_send) >= SEND_TIMEOUT)
            .map(|entry| {
                entry.last_send = now;
                (entry.recipient.clone(), entry.payload.clone())
            })
            .collect()
    }

    /// Drops every pending entry. Called from `stop()` so retransmission
    /// state doesn't leak past the worker thread's lifetime.
    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_removes_entry_before_it_is_due() {
        let timers = SendTimers::default();
        timers.register(7, NodeRef::peer("10.0.0.1", 9000), vec![1, 2, 3]);
        timers.cancel(7);
        assert!(timers.due_for_retransmit().is_empty());
    }

    #[test]
    fn fresh_entry_is_not_yet_due() {
        let timers = SendTimers::default();
        timers.register(7, NodeRef::peer("10.0.0.1", 9000), vec![1, 2, 3]);
        assert!(timers.due_for_retransmit().is_empty());
    }

    #[test]
    fn clear_drops_all_entries() {
        let timers = SendTimers::default();
        timers.register(1, NodeRef::peer("10.0.0.1", 9000), vec![]);
        timers.register(2, NodeRef::peer("10.0.0.2", 9001), vec![]);
        timers.clear();
        assert!(timers.due_for_retransmit().is_empty());
    }
}
