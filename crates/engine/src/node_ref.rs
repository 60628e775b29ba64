use codec::identifier;

/// A cached reference to a peer on the ring.
///
/// A `NodeRef` does not imply liveness — it is only a cached address plus
/// the identifier derived from it. Replaces the C original's
/// `NodeRef* | isSelf` pointer comparisons (see spec design notes) with a
/// plain, comparable-by-id value type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub ip: String,
    pub id: u32,
    pub app_port: u16,
    pub is_self: bool,
}

impl NodeRef {
    /// Builds a peer reference, deriving its ring id from its IP string.
    pub fn peer(ip: impl Into<String>, app_port: u16) -> Self {
        let ip = ip.into();
        let id = identifier::hash_str(&ip);
        Self {
            id,
            ip,
            app_port,
            is_self: false,
        }
    }

    /// Builds the self reference for a node with the given id.
    pub fn this(ip: impl Into<String>, id: u32, app_port: u16) -> Self {
        Self {
            id,
            ip: ip.into(),
            app_port,
            is_self: true,
        }
    }
}
