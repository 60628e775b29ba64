//! ## Chord ring wire codec
//!
//! Encode/decode for the fixed-schema UDP datagrams exchanged between Chord
//! nodes (join/stabilize/finger-fix/lookup messages), plus the consistent
//! hash mapping IP strings and lookup keys onto ring identifiers.
//!
//! Every datagram begins with `(type: u32, size: u32)` in big-endian; `size`
//! counts the whole datagram. See [`message::Message`] for the per-type
//! layout.

pub mod identifier;
pub mod message;

#[derive(Debug)]
pub enum Error {
    /// `size` claimed less than the header requires, or a trailing string
    /// field was not NUL-terminated within the datagram.
    Malformed,
    /// The `type` field did not match any known message variant.
    UnknownType(u32),
    Utf8(std::str::Utf8Error),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed message"),
            Self::UnknownType(ty) => write!(f, "unknown message type {ty}"),
            Self::Utf8(e) => write!(f, "invalid utf-8 in trailing string: {e}"),
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(value: std::str::Utf8Error) -> Self {
        Self::Utf8(value)
    }
}
