/// Stable error codes for the public API (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A lookup timed out with no authoritative answer.
    InvalidKey,
    /// The transport failed at runtime; the worker loop has terminated.
    ConnLost,
    /// Binding the UDP socket failed.
    CannotConnect,
    /// `JOIN_TRIALS` attempts to reach the bootstrap peer all timed out.
    CannotJoinChord,
    /// The worker thread could not be spawned.
    CannotStartThread,
    /// An API method was called before `init()`/out of order.
    NotInitialized,
    /// An API method that requires `SERVICING` was called in another state.
    NotInService,
    /// A ring-wide operation was requested while this node believes it is
    /// alone (no successor other than itself).
    NoSuccessor,
    /// The requested key is owned by this node itself.
    LocalKey,
}

impl Error {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidKey => "invalid key supplied, or lookup timed out with no answer",
            Self::ConnLost => "connection lost",
            Self::CannotConnect => "cannot connect",
            Self::CannotJoinChord => "cannot join the chord network",
            Self::CannotStartThread => "cannot start thread",
            Self::NotInitialized => "node is not initialized",
            Self::NotInService => "node is not currently in service",
            Self::NoSuccessor => "node has no successor other than itself",
            Self::LocalKey => "key is owned by this node",
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::error::Error for Error {}
