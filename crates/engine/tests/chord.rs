//! End-to-end scenarios over real loopback UDP sockets, covering the
//! scenarios enumerated in spec.md §8. Each test uses a distinct
//! `127.x.y.z` loopback alias per simulated node (routed locally without any
//! extra configuration on Linux) so several nodes can share one
//! `chord_port`, exactly as distinct hosts would in production.

use std::thread;
use std::time::{Duration, Instant};

use engine::{ChordNode, Error, Phase};

fn wait_for(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if Instant::now() >= deadline {
            return predicate();
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// Scenario 1: a lone node answers every lookup with itself and refuses a
/// ring-map traversal.
#[test]
fn solo_ring_answers_locally_and_has_no_map() {
    let node = ChordNode::new(9200, 0, Some("127.0.10.1".to_string()));
    node.init().unwrap();
    node.start().unwrap();

    assert_eq!(node.state(), Phase::Servicing);

    let (ip, port) = node.query("anything", 1_000).unwrap();
    assert_eq!((ip.as_str(), port), ("127.0.10.1", 9200));

    assert_eq!(node.get_chord_map(), Err(Error::NoSuccessor));

    node.stop();
}

/// Scenario 2: two nodes converge to mutual successor/predecessor within a
/// couple of stabilize rounds, and each side emits a SyncNotification
/// naming the other.
#[test]
fn two_node_join_converges_and_notifies_both_directions() {
    const PORT: u16 = 18801;

    let a = ChordNode::new(9201, PORT, Some("127.0.11.1".to_string()));
    a.init().unwrap();
    a.start().unwrap();

    let b = ChordNode::new(9202, PORT, Some("127.0.11.2".to_string()));
    b.init().unwrap();
    b.set_join_point(Some("127.0.11.1".to_string()));
    b.start().unwrap();

    assert!(
        wait_for(|| a.has_notification(), Duration::from_secs(4)),
        "a never saw a predecessor notification"
    );
    let note_a = a.pop_notification().expect("a has a queued notification");
    assert_eq!(note_a.ip, "127.0.11.2");
    assert_eq!(note_a.app_port, 9202);

    assert!(
        wait_for(|| b.has_notification(), Duration::from_secs(4)),
        "b never saw a predecessor notification"
    );
    let note_b = b.pop_notification().expect("b has a queued notification");
    assert_eq!(note_b.ip, "127.0.11.1");
    assert_eq!(note_b.app_port, 9201);

    // A's only peer is B, so any key not owned by A resolves to B.
    let (ip, port) = a.query("some-key", 2_000).unwrap();
    assert_eq!((ip.as_str(), port), ("127.0.11.2", 9202));

    let map = a.get_chord_map().unwrap();
    assert!(map.contains("127.0.11.1"));
    assert!(map.contains("127.0.11.2"));
    assert!(map.ends_with("(End)"));

    a.stop();
    b.stop();
}

/// Scenario 3 (generalized beyond the spec's illustrative m=8 ids, since
/// production ids come from SHA-1): a three-node ring resolves every key to
/// the same owner regardless of which member is asked, possibly via a
/// forwarding hop.
#[test]
fn three_node_ring_lookup_is_consistent_across_members() {
    const PORT: u16 = 19001;

    let a = ChordNode::new(9301, PORT, Some("127.0.12.1".to_string()));
    a.init().unwrap();
    a.start().unwrap();

    let b = ChordNode::new(9302, PORT, Some("127.0.12.2".to_string()));
    b.init().unwrap();
    b.set_join_point(Some("127.0.12.1".to_string()));
    b.start().unwrap();

    thread::sleep(Duration::from_millis(1_500));

    let c = ChordNode::new(9303, PORT, Some("127.0.12.3".to_string()));
    c.init().unwrap();
    c.set_join_point(Some("127.0.12.1".to_string()));
    c.start().unwrap();

    // Several stabilize rounds (1.5s each) to let all three successor
    // pointers settle into a single consistent ring.
    thread::sleep(Duration::from_secs(8));

    let members = ["127.0.12.1", "127.0.12.2", "127.0.12.3"];

    for key in ["alpha", "beta", "gamma", "delta", "epsilon"] {
        let (owner_a, _) = a.query(key, 2_000).unwrap();
        let (owner_b, _) = b.query(key, 2_000).unwrap();
        let (owner_c, _) = c.query(key, 2_000).unwrap();

        assert!(members.contains(&owner_a.as_str()), "unknown owner {owner_a}");
        assert_eq!(owner_a, owner_b, "a and b disagree on the owner of {key}");
        assert_eq!(owner_b, owner_c, "b and c disagree on the owner of {key}");
    }

    let map = a.get_chord_map().unwrap();
    for ip in members {
        assert!(map.contains(ip), "ring map {map:?} is missing {ip}");
    }
    assert!(map.ends_with("(End)"));

    a.stop();
    b.stop();
    c.stop();
}

/// Scenario 6: joining against an address nobody is listening on exhausts
/// `JOIN_TRIALS` and fails with `CannotJoinChord`.
#[test]
fn join_against_unreachable_bootstrap_times_out() {
    let node = ChordNode::new(9203, 18900, Some("127.0.13.1".to_string()));
    node.init().unwrap();
    node.set_join_point(Some("127.0.13.254".to_string()));

    let started = Instant::now();
    let result = node.start();

    assert_eq!(result, Err(Error::CannotJoinChord));
    assert!(started.elapsed() >= Duration::from_secs(7));
    assert_eq!(node.state(), Phase::ServiceFailed);
}

/// `set_join_point(None)` (or pointing at one's own address) always starts a
/// fresh ring rather than attempting a join.
#[test]
fn join_point_equal_to_self_starts_a_new_ring() {
    let node = ChordNode::new(9204, 0, Some("127.0.14.1".to_string()));
    node.init().unwrap();
    node.set_join_point(Some("127.0.14.1".to_string()));
    node.start().unwrap();

    assert_eq!(node.state(), Phase::Servicing);
    let (ip, port) = node.query("any-key", 500).unwrap();
    assert_eq!((ip.as_str(), port), ("127.0.14.1", 9204));

    node.stop();
}
