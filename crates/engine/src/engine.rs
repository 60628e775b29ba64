use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use codec::identifier;
use codec::message::Message;

use crate::error::Error;
use crate::node_ref::NodeRef;
use crate::notify::{NotificationQueue, SyncNotification};
use crate::queues::{MapReply, ResponseQueue, SuccessorReply};
use crate::ring;
use crate::state::{NodeState, Phase};
use crate::timers::SendTimers;
use crate::transport::{RecvOutcome, Transport};

/// Attempts made against the bootstrap peer before giving up (spec.md
/// §4.5.1).
pub const JOIN_TRIALS: u32 = 5;
const JOIN_TIMEOUT: Duration = Duration::from_millis(1500);
const STABILIZE_INTERVAL: Duration = Duration::from_millis(1500);
const STABILIZE_GRACE: Duration = Duration::from_millis(200);
const FINGER_FIX_INTERVAL: Duration = Duration::from_secs(3);
const TICK_INTERVAL: Duration = Duration::from_millis(100);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Everything the worker thread and the calling threads (lookups, the ring
/// map snapshot) share: node state, the four explicit mutex-guarded tables
/// of spec.md §5, the transport, and a run flag.
pub(crate) struct Inner {
    pub state: Arc<NodeState>,
    pub successor_queue: ResponseQueue<SuccessorReply>,
    pub map_queue: ResponseQueue<MapReply>,
    pub timers: SendTimers,
    pub notifications: NotificationQueue,
    pub transport: Transport,
    pub running: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryKind {
    Successor,
    Join,
    Finger,
}

fn peer_addr(ip: &str, port: u16) -> Option<SocketAddr> {
    (ip, port).to_socket_addrs().ok()?.next()
}

fn send_to(inner: &Inner, ip: &str, port: u16, msg: &Message) {
    if let Some(addr) = peer_addr(ip, port) {
        if let Err(e) = inner.transport.send(addr, &msg.encode()) {
            log::debug!("send to {ip}:{port} failed: {e}");
        }
    }
}

/// Resolves a bootstrap address and retries `JoinSuccessorQuery` up to
/// `JOIN_TRIALS` times, discarding any non-matching reply without consuming
/// a retry (spec.md §4.5.1 step 4).
pub(crate) fn join(inner: &Inner, bootstrap_ip: &str) -> Result<NodeRef, Error> {
    let addr = peer_addr(bootstrap_ip, inner.state.chord_port).ok_or(Error::CannotJoinChord)?;
    let query = Message::JoinSuccessorQuery {
        search_term: inner.state.self_id,
        app_port: inner.state.app_port as u32,
        sender_ip: inner.state.self_ip.clone(),
    };
    let query_bytes = query.encode();

    for attempt in 1..=JOIN_TRIALS {
        if inner.transport.send(addr, &query_bytes).is_err() {
            return Err(Error::CannotConnect);
        }

        let deadline = Instant::now() + JOIN_TIMEOUT;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match inner.transport.recv(remaining) {
                RecvOutcome::Payload(bytes, _from) => {
                    if let Ok(Message::SuccessorResponse {
                        search_term,
                        app_port,
                        responder_ip,
                    }) = Message::decode(&bytes)
                    {
                        if search_term == inner.state.self_id {
                            return Ok(NodeRef::peer(responder_ip, app_port as u16));
                        }
                    }
                    // Non-matching message: discard and keep waiting within this attempt.
                }
                RecvOutcome::Empty => {}
                RecvOutcome::Timeout => break,
                RecvOutcome::SocketError(e) => {
                    log::warn!("join attempt {attempt} socket error: {e}");
                    return Err(Error::CannotConnect);
                }
            }
        }

        log::warn!("join attempt {attempt}/{JOIN_TRIALS} to {bootstrap_ip} timed out");
    }

    Err(Error::CannotJoinChord)
}

/// Sends the post-join `UpdatePredecessor` notification and registers it
/// for retransmission until acknowledged (spec.md §4.5.1 step 6).
pub(crate) fn notify_new_successor(inner: &Inner, successor: &NodeRef) {
    let msg = Message::UpdatePredecessor {
        app_port: inner.state.app_port as u32,
        predecessor_ip: inner.state.self_ip.clone(),
    };
    let bytes = msg.encode();

    if let Some(addr) = peer_addr(&successor.ip, inner.state.chord_port) {
        let _ = inner.transport.send(addr, &bytes);
    }

    inner
        .timers
        .register(inner.state.self_id, successor.clone(), bytes.to_vec());
}

fn retransmit_due(inner: &Inner) {
    for (recipient, payload) in inner.timers.due_for_retransmit() {
        if let Some(addr) = peer_addr(&recipient.ip, inner.state.chord_port) {
            if let Err(e) = inner.transport.send(addr, &payload) {
                log::debug!("retransmit to {} failed: {e}", recipient.ip);
            }
        }
    }
}

fn maybe_stabilize(inner: &Inner, last_stabilize: &mut Instant) {
    if last_stabilize.elapsed() < STABILIZE_INTERVAL {
        return;
    }

    // Scheduled 200ms early (spec.md §4.5.3 step 2: `last_stabilize_ts :=
    // now + 1.5s - 200ms`), so an in-flight StabilizeResponse has settling
    // room before the next attempt is due.
    *last_stabilize = Instant::now() - STABILIZE_GRACE;

    let successor = inner.state.successor();
    if successor.is_self {
        // Closes a two-node ring: the other side already pointed at us.
        if let Some(pred) = inner.state.predecessor() {
            inner.state.set_successor(pred);
        }
        return;
    }

    inner.state.set_substate(Phase::Stabilizing);
    send_to(
        inner,
        &successor.ip,
        inner.state.chord_port,
        &Message::StabilizeRequest {
            app_port: inner.state.app_port as u32,
            sender_ip: inner.state.self_ip.clone(),
        },
    );
}

fn maybe_fix_fingers(inner: &Inner, last_fix: &mut Instant) {
    if last_fix.elapsed() < FINGER_FIX_INTERVAL {
        return;
    }
    *last_fix = Instant::now();

    let successor = inner.state.successor();
    if successor.is_self {
        return;
    }

    for i in 0..identifier::ID_BITS {
        let target = ring::finger_target(inner.state.self_id, i);

        if ring::in_arc(target, inner.state.self_id, successor.id) {
            inner.state.set_finger(target, successor.clone());
        } else {
            send_to(
                inner,
                &successor.ip,
                inner.state.chord_port,
                &Message::FingerQuery {
                    search_term: target,
                    app_port: inner.state.app_port as u32,
                    sender_ip: inner.state.self_ip.clone(),
                },
            );
        }
    }
}

/// Resolves a response to an inbound `SuccessorQuery`/`JoinSuccessorQuery`/
/// `FingerQuery`, per spec.md §4.5.2.
fn handle_query(inner: &Inner, kind: QueryKind, search_term: u32, sender_app_port: u16, sender_ip: String) {
    if sender_ip == inner.state.self_ip {
        // The query looped back to its originator.
        if kind == QueryKind::Finger {
            inner.state.set_finger(search_term, inner.state.this_ref());
        } else {
            inner.successor_queue.push(SuccessorReply {
                search_term,
                ip: inner.state.self_ip.clone(),
                app_port: inner.state.app_port,
            });
        }
        return;
    }

    let successor = inner.state.successor();

    if successor.is_self {
        // Alone on the ring: the sender becomes our successor.
        inner.state.set_successor(NodeRef::peer(sender_ip.clone(), sender_app_port));
        reply(inner, kind, search_term, &sender_ip, inner.state.app_port, &inner.state.self_ip);
        return;
    }

    if ring::in_arc(search_term, inner.state.self_id, successor.id) {
        reply(inner, kind, search_term, &sender_ip, successor.app_port, &successor.ip);
        return;
    }

    // Forward. JoinSuccessorQuery avoids fingers, which may still be
    // partially built during another node's join.
    let use_finger = kind != QueryKind::Join;
    let target = inner
        .state
        .with_fingers(|fingers| ring::successor_of(search_term, fingers, &successor, use_finger));

    let forwarded = match kind {
        QueryKind::Successor => Message::SuccessorQuery {
            search_term,
            app_port: sender_app_port as u32,
            sender_ip,
        },
        QueryKind::Join => Message::JoinSuccessorQuery {
            search_term,
            app_port: sender_app_port as u32,
            sender_ip,
        },
        QueryKind::Finger => Message::FingerQuery {
            search_term,
            app_port: sender_app_port as u32,
            sender_ip,
        },
    };

    send_to(inner, &target.ip, inner.state.chord_port, &forwarded);
}

fn reply(inner: &Inner, kind: QueryKind, search_term: u32, to_ip: &str, responder_port: u16, responder_ip: &str) {
    let msg = if kind == QueryKind::Finger {
        Message::FingerResponse {
            search_term,
            app_port: responder_port as u32,
            responder_ip: responder_ip.to_string(),
        }
    } else {
        Message::SuccessorResponse {
            search_term,
            app_port: responder_port as u32,
            responder_ip: responder_ip.to_string(),
        }
    };

    send_to(inner, to_ip, inner.state.chord_port, &msg);
}

/// Dispatches one decoded inbound message (spec.md §4.5.2).
fn handle_inbound(inner: &Inner, msg: Message) {
    match msg {
        Message::UpdatePredecessor {
            app_port,
            predecessor_ip,
        } => {
            let candidate = NodeRef::peer(predecessor_ip, app_port as u16);
            let changed = match inner.state.predecessor() {
                None => true,
                Some(current) => current.id != candidate.id || current.app_port != candidate.app_port,
            };

            if changed {
                inner.state.set_predecessor(Some(candidate.clone()));
                inner.notifications.push(SyncNotification {
                    ip: candidate.ip.clone(),
                    app_port: candidate.app_port,
                });
            }

            send_to(
                inner,
                &candidate.ip,
                inner.state.chord_port,
                &Message::UpdatePredecessorAck {
                    hashed_id: candidate.id,
                },
            );
        }
        Message::UpdatePredecessorAck { hashed_id } => {
            inner.timers.cancel(hashed_id);
        }
        Message::StabilizeRequest { app_port, sender_ip } => {
            if inner.state.predecessor().is_none() {
                let candidate = NodeRef::peer(sender_ip.clone(), app_port as u16);
                inner.state.set_predecessor(Some(candidate.clone()));
                // This is also how a predecessor gets adopted without ever
                // receiving an explicit UpdatePredecessor (e.g. the passive
                // side of a fresh two-node ring, spec.md §8 scenario 2) — the
                // notification fires on any predecessor adoption, not only
                // the UpdatePredecessor handler below.
                inner.notifications.push(SyncNotification {
                    ip: candidate.ip,
                    app_port: candidate.app_port,
                });
            }

            let (pred_ip, pred_port) = match inner.state.predecessor() {
                Some(p) => (p.ip, p.app_port as u32),
                None => (String::new(), 0),
            };

            send_to(
                inner,
                &sender_ip,
                inner.state.chord_port,
                &Message::StabilizeResponse {
                    app_port: pred_port,
                    predecessor_ip: pred_ip,
                },
            );
        }
        Message::StabilizeResponse {
            app_port,
            predecessor_ip,
        } => {
            if inner.state.substate() == Phase::Stabilizing {
                let is_self = predecessor_ip == inner.state.self_ip && app_port as u16 == inner.state.app_port;
                if !predecessor_ip.is_empty() && !is_self {
                    inner.state.set_successor(NodeRef::peer(predecessor_ip, app_port as u16));
                }
                inner.state.set_substate(Phase::InNetwork);
            }
        }
        Message::ChordMapQuery { seq, sender_ip } => {
            if sender_ip == inner.state.self_ip {
                if inner.state.phase() == Phase::MappingChord {
                    inner.state.set_phase(Phase::MappingCompleted);
                }
                return;
            }

            send_to(
                inner,
                &sender_ip,
                inner.state.chord_port,
                &Message::ChordMapResponse {
                    seq: seq + 1,
                    responder_ip: inner.state.self_ip.clone(),
                },
            );

            let successor = inner.state.successor();
            if successor.is_self {
                send_to(
                    inner,
                    &sender_ip,
                    inner.state.chord_port,
                    &Message::ChordMapResponse {
                        seq: 0,
                        responder_ip: inner.state.self_ip.clone(),
                    },
                );
            } else {
                send_to(
                    inner,
                    &successor.ip,
                    inner.state.chord_port,
                    &Message::ChordMapQuery {
                        seq: seq + 1,
                        sender_ip,
                    },
                );
            }
        }
        Message::ChordMapResponse { seq, responder_ip } => {
            if inner.state.phase() != Phase::MappingChord {
                return;
            }

            inner.map_queue.push(MapReply { seq, ip: responder_ip });

            if seq == 0 {
                inner.state.set_phase(Phase::MappingCompleted);
            }
        }
        Message::SuccessorQuery {
            search_term,
            app_port,
            sender_ip,
        } => handle_query(inner, QueryKind::Successor, search_term, app_port as u16, sender_ip),
        Message::JoinSuccessorQuery {
            search_term,
            app_port,
            sender_ip,
        } => handle_query(inner, QueryKind::Join, search_term, app_port as u16, sender_ip),
        Message::FingerQuery {
            search_term,
            app_port,
            sender_ip,
        } => handle_query(inner, QueryKind::Finger, search_term, app_port as u16, sender_ip),
        Message::SuccessorResponse {
            search_term,
            app_port,
            responder_ip,
        } => {
            inner.successor_queue.push(SuccessorReply {
                search_term,
                ip: responder_ip,
                app_port: app_port as u16,
            });
        }
        Message::FingerResponse {
            search_term,
            app_port,
            responder_ip,
        } => {
            inner
                .state
                .set_finger(search_term, NodeRef::peer(responder_ip, app_port as u16));
        }
    }
}

/// The worker loop: alternates periodic jobs with draining one inbound
/// datagram. The single `recv(TICK_INTERVAL)` call below *is* the spec's
/// two described suspension points (blocking recv-with-timeout, and the
/// 100ms pace between empty receives) — a timed recv already paces idle
/// ticks, so no separate sleep is needed.
pub(crate) fn run(inner: Arc<Inner>) {
    let mut last_stabilize = Instant::now() - STABILIZE_INTERVAL;
    let mut last_finger_fix = Instant::now() - FINGER_FIX_INTERVAL;

    while inner.running.load(Ordering::Acquire) {
        retransmit_due(&inner);
        maybe_stabilize(&inner, &mut last_stabilize);
        maybe_fix_fingers(&inner, &mut last_finger_fix);

        match inner.transport.recv(TICK_INTERVAL) {
            RecvOutcome::Payload(bytes, _from) => match Message::decode(&bytes) {
                Ok(msg) => handle_inbound(&inner, msg),
                Err(e) => log::warn!("dropping malformed datagram: {e}"),
            },
            RecvOutcome::Empty | RecvOutcome::Timeout => {}
            RecvOutcome::SocketError(e) => {
                log::error!("transport failed, worker exiting: {e}");
                inner.state.set_phase(Phase::ServiceFailed);
                break;
            }
        }
    }

    log::info!("worker thread for {} exiting", inner.state.self_ip);
}

/// Looks up the owner of `key` (spec.md §4.5.4).
pub(crate) fn query(inner: &Inner, key: &str, timeout_ms: u64) -> Result<(String, u16), Error> {
    let successor = inner.state.successor();
    if successor.is_self {
        return Ok((inner.state.self_ip.clone(), inner.state.app_port));
    }

    let kh = identifier::hash_str(key);

    if ring::in_arc(kh, inner.state.self_id, successor.id) {
        return Ok((successor.ip, successor.app_port));
    }

    let target = inner
        .state
        .with_fingers(|fingers| ring::successor_of(kh, fingers, &successor, true));
    let addr = peer_addr(&target.ip, inner.state.chord_port).ok_or(Error::InvalidKey)?;

    let msg = Message::SuccessorQuery {
        search_term: kh,
        app_port: inner.state.app_port as u32,
        sender_ip: inner.state.self_ip.clone(),
    };
    let bytes = msg.encode();
    inner.transport.send(addr, &bytes).map_err(|_| Error::ConnLost)?;
    inner.timers.register(kh, target, bytes.to_vec());

    let deadline = (timeout_ms != 0).then(|| Instant::now() + Duration::from_millis(timeout_ms));

    loop {
        if let Some(found) = inner.successor_queue.take_matching(|r| r.search_term == kh) {
            inner.timers.cancel(kh);
            return Ok((found.ip, found.app_port));
        }

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                inner.timers.cancel(kh);
                return Err(Error::InvalidKey);
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Runs a ring-map traversal and returns it as displayable text (spec.md
/// §4.5.5).
pub(crate) fn get_chord_map(inner: &Inner) -> Result<String, Error> {
    if inner.state.phase() != Phase::Servicing {
        return Err(Error::NotInService);
    }

    let successor = inner.state.successor();
    if successor.is_self {
        return Err(Error::NoSuccessor);
    }

    inner.state.set_phase(Phase::MappingChord);
    send_to(
        inner,
        &successor.ip,
        inner.state.chord_port,
        &Message::ChordMapQuery {
            seq: 1,
            sender_ip: inner.state.self_ip.clone(),
        },
    );

    while inner.state.phase() == Phase::MappingChord {
        thread::sleep(POLL_INTERVAL);
    }

    let mut replies = inner.map_queue.drain();
    replies.sort_by_key(|r| r.seq);

    let deadend = replies.iter().find(|r| r.seq == 0).map(|r| r.ip.clone());
    let mut hosts: Vec<String> = replies
        .into_iter()
        .filter(|r| r.seq != 0)
        .map(|r| r.ip)
        .collect();

    if deadend.is_none() {
        hosts.push(inner.state.self_ip.clone());
    }

    let mut text = hosts
        .iter()
        .map(|h| format!("[{h}]"))
        .collect::<Vec<_>>()
        .join("-->");

    match deadend {
        Some(ip) => text.push_str(&format!("-->[{ip}] (Deadend)")),
        None => text.push_str(" (End)"),
    }

    inner.state.set_phase(Phase::Servicing);
    Ok(text)
}

/// Renders the current finger table as displayable text.
pub(crate) fn get_finger_table(inner: &Inner) -> String {
    inner
        .state
        .finger_snapshot()
        .into_iter()
        .map(|(target, node)| format!("{target} -> {}:{}", node.ip, node.app_port))
        .collect::<Vec<_>>()
        .join("\n")
}
