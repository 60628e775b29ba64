//! ## Chord protocol engine
//!
//! The state machine coordinating join/stabilize/finger-fix/lookup over an
//! unreliable UDP transport (spec.md §4.5), together with the node state,
//! ring arithmetic, send-timer registry, and notification queue it depends
//! on. [`node::ChordNode`] is the public, host-facing entry point; every
//! other module here is an implementation detail reachable through it.

pub mod engine;
pub mod error;
pub mod node;
pub mod node_ref;
pub mod notify;
pub mod queues;
pub mod ring;
pub mod state;
pub mod timers;
pub mod transport;

pub use error::Error;
pub use node::ChordNode;
pub use node_ref::NodeRef;
pub use notify::SyncNotification;
pub use state::Phase;
