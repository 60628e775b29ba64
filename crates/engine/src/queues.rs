use std::collections::VecDeque;

use parking_lot::Mutex;

/// A reply to an outstanding `SuccessorQuery`/`JoinSuccessorQuery`, keyed by
/// the search term it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessorReply {
    pub search_term: u32,
    pub ip: String,
    pub app_port: u16,
}

/// One hop of an in-progress ring-map traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapReply {
    pub seq: u32,
    pub ip: String,
}

/// Bounded-in-principle, unbounded-in-code FIFO of pending responses,
/// polled by callers waiting on a specific key (spec.md §3: "Pending-response
/// queues").
#[derive(Default)]
pub struct ResponseQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> ResponseQueue<T> {
    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
    }

    /// Removes and returns the first item matching `predicate`, leaving
    /// non-matching entries in place for later polls.
    pub fn take_matching(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        let mut items = self.items.lock();
        let pos = items.iter().position(predicate)?;
        items.remove(pos)
    }

    /// Removes and returns every pending item, in FIFO order.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_matching_skips_non_matching_entries() {
        let queue = ResponseQueue::default();
        queue.push(SuccessorReply {
            search_term: 1,
            ip: "10.0.0.1".into(),
            app_port: 9000,
        });
        queue.push(SuccessorReply {
            search_term: 2,
            ip: "10.0.0.2".into(),
            app_port: 9001,
        });

        let found = queue.take_matching(|r| r.search_term == 2).unwrap();
        assert_eq!(found.ip, "10.0.0.2");

        // The non-matching entry (search_term 1) is still there.
        assert!(queue.take_matching(|r| r.search_term == 1).is_some());
        assert!(queue.take_matching(|r| r.search_term == 1).is_none());
    }

    #[test]
    fn drain_empties_queue_in_order() {
        let queue = ResponseQueue::default();
        queue.push(MapReply {
            seq: 1,
            ip: "a".into(),
        });
        queue.push(MapReply {
            seq: 2,
            ip: "b".into(),
        });

        let all = queue.drain();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].seq, 1);
        assert_eq!(all[1].seq, 2);
        assert!(queue.drain().is_empty());
    }
}
