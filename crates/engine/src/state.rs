use std::collections::BTreeMap;

use parking_lot::{Mutex, RwLock};

use crate::node_ref::NodeRef;

/// The node's lifecycle/`state` and its transient `substate`, sharing one
/// enum as spec.md does (both fields range over the same symbol set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initialized,
    WaitingToJoin,
    InNetwork,
    Servicing,
    MappingChord,
    MappingCompleted,
    Stabilizing,
    ServiceClosing,
    ServiceFailed,
    UpdatingFinger,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Uninitialized
    }
}

/// Shared node state: self identity, successor/predecessor pointers, finger
/// table, and lifecycle phase.
///
/// `self_id`/`self_ip`/`chord_port`/`app_port` are set once in
/// [`NodeState::new`] and never mutated afterward (spec.md: "immutable
/// after init"). Everything else is behind a lock. The finger table uses a
/// `BTreeMap` rather than the hashed `Table` wrapper the rest of this
/// workspace's sibling crate favors, because `successor_of` must walk
/// fingers in descending key order — an ordering a hashed table cannot give
/// cheaply.
pub struct NodeState {
    pub self_id: u32,
    pub self_ip: String,
    pub chord_port: u16,
    pub app_port: u16,
    successor: RwLock<NodeRef>,
    predecessor: RwLock<Option<NodeRef>>,
    fingers: Mutex<BTreeMap<u32, NodeRef>>,
    phase: Mutex<Phase>,
    substate: Mutex<Phase>,
}

impl NodeState {
    pub fn new(self_id: u32, self_ip: String, chord_port: u16, app_port: u16) -> Self {
        let this = NodeRef::this(self_ip.clone(), self_id, app_port);

        Self {
            self_id,
            self_ip,
            chord_port,
            app_port,
            successor: RwLock::new(this),
            predecessor: RwLock::new(None),
            fingers: Mutex::new(BTreeMap::new()),
            phase: Mutex::new(Phase::Uninitialized),
            substate: Mutex::new(Phase::Uninitialized),
        }
    }

    pub fn this_ref(&self) -> NodeRef {
        NodeRef::this(self.self_ip.clone(), self.self_id, self.app_port)
    }

    pub fn successor(&self) -> NodeRef {
        self.successor.read().clone()
    }

    pub fn set_successor(&self, node: NodeRef) {
        *self.successor.write() = node;
    }

    /// True when this node believes it is alone on the ring.
    pub fn is_alone(&self) -> bool {
        self.successor().is_self
    }

    pub fn predecessor(&self) -> Option<NodeRef> {
        self.predecessor.read().clone()
    }

    pub fn set_predecessor(&self, node: Option<NodeRef>) {
        *self.predecessor.write() = node;
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    pub fn set_phase(&self, phase: Phase) {
        *self.phase.lock() = phase;
    }

    pub fn substate(&self) -> Phase {
        *self.substate.lock()
    }

    pub fn set_substate(&self, substate: Phase) {
        *self.substate.lock() = substate;
    }

    pub fn set_finger(&self, target: u32, node: NodeRef) {
        self.fingers.lock().insert(target, node);
    }

    pub fn with_fingers<R>(&self, f: impl FnOnce(&BTreeMap<u32, NodeRef>) -> R) -> R {
        f(&self.fingers.lock())
    }

    pub fn finger_snapshot(&self) -> Vec<(u32, NodeRef)> {
        self.fingers
            .lock()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }
}
