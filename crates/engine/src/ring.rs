use std::collections::BTreeMap;

use crate::node_ref::NodeRef;

/// Half-open modular arc membership test: is `key` in `(start, end]`?
///
/// - `start < end`: the plain interval `start < key <= end`.
/// - `start > end`: the wraparound interval `key > start || key <= end`.
/// - `start == end`: by convention, the whole ring.
///
/// # Test
///
/// ```
/// use chord_engine::ring::in_arc;
///
/// // plain interval
/// assert!(in_arc(15, 10, 20));
/// assert!(!in_arc(25, 10, 20));
/// assert!(in_arc(20, 10, 20)); // inclusive end
/// assert!(!in_arc(10, 10, 20)); // exclusive start
///
/// // wraparound: (200, 10]
/// assert!(in_arc(250, 200, 10));
/// assert!(in_arc(5, 200, 10));
/// assert!(!in_arc(100, 200, 10));
///
/// // degenerate arc covers everything
/// assert!(in_arc(0, 7, 7));
/// assert!(in_arc(7, 7, 7));
/// ```
pub fn in_arc(key: u32, start: u32, end: u32) -> bool {
    if start == end {
        true
    } else if start < end {
        key > start && key <= end
    } else {
        key > start || key <= end
    }
}

/// Computes the `i`-th finger target `(self_id + 2^i) mod 2^32`.
pub fn finger_target(self_id: u32, i: u32) -> u32 {
    self_id.wrapping_add(1u32.wrapping_shl(i))
}

/// Picks a forwarding target for `query`.
///
/// If `use_finger` is false, or no finger qualifies, the current successor
/// is returned — this keeps forwarding correct even with arbitrarily stale
/// fingers, since `successor` is always a safe (if slow) fallback hop.
/// Otherwise the fingers are scanned in descending key order and the first
/// whose key is less than `query` is used.
pub fn successor_of(
    query: u32,
    fingers: &BTreeMap<u32, NodeRef>,
    successor: &NodeRef,
    use_finger: bool,
) -> NodeRef {
    if use_finger {
        for (&target, node) in fingers.iter().rev() {
            if target < query {
                return node.clone();
            }
        }
    }

    successor.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arc_rule_matches_glossary_definition() {
        for start in 0u32..32 {
            for end in 0u32..32 {
                for key in 0u32..32 {
                    let expected = if start == end {
                        true
                    } else if start < end {
                        key > start && key <= end
                    } else {
                        key > start || key <= end
                    };

                    assert_eq!(in_arc(key, start, end), expected, "key={key} start={start} end={end}");
                }
            }
        }
    }

    #[test]
    fn successor_of_falls_back_without_fingers() {
        let successor = NodeRef::peer("10.0.0.2", 9000);
        let fingers = BTreeMap::new();
        assert_eq!(successor_of(123, &fingers, &successor, true), successor);
    }

    #[test]
    fn successor_of_picks_closest_preceding_finger() {
        let successor = NodeRef::peer("10.0.0.2", 9000);
        let mut fingers = BTreeMap::new();
        fingers.insert(50, NodeRef::peer("10.0.0.3", 9001));
        fingers.insert(150, NodeRef::peer("10.0.0.4", 9002));

        // Query 200: both 50 and 150 are < 200, descending order picks 150 first.
        assert_eq!(
            successor_of(200, &fingers, &successor, true),
            NodeRef::peer("10.0.0.4", 9002)
        );

        // Query 100: only 50 qualifies.
        assert_eq!(
            successor_of(100, &fingers, &successor, true),
            NodeRef::peer("10.0.0.3", 9001)
        );

        // Query 10: nothing qualifies, fall back to successor.
        assert_eq!(successor_of(10, &fingers, &successor, true), successor);
    }

    #[test]
    fn successor_of_ignores_fingers_when_disabled() {
        let successor = NodeRef::peer("10.0.0.2", 9000);
        let mut fingers = BTreeMap::new();
        fingers.insert(50, NodeRef::peer("10.0.0.3", 9001));
        assert_eq!(successor_of(200, &fingers, &successor, false), successor);
    }
}
