use sha1::{Digest, Sha1};

/// Width of the ring identifier space, in bits.
///
/// The reference design fixes `m = 32`; identifiers are plain `u32`s and
/// arithmetic on them wraps at the type boundary, which is exactly `mod 2^32`.
pub const ID_BITS: u32 = 32;

/// Maps an arbitrary byte string to a ring identifier.
///
/// SHA-1 is taken over `bytes` followed by a terminating NUL, the 160-bit
/// digest is read as a big-endian integer, and the result is reduced modulo
/// `2^32` by keeping only its low-order 4 bytes (the last 4 bytes of a
/// big-endian encoding are its least-significant ones, so this is exactly
/// `digest mod 2^32`).
///
/// # Test
///
/// ```
/// use chord_codec::identifier::hash;
///
/// // deterministic: same bytes always hash to the same id.
/// assert_eq!(hash(b"10.0.0.1"), hash(b"10.0.0.1"));
/// assert_ne!(hash(b"10.0.0.1"), hash(b"10.0.0.2"));
/// ```
pub fn hash(bytes: &[u8]) -> u32 {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hasher.update([0u8]);
    let digest = hasher.finalize();
    u32::from_be_bytes(digest[16..20].try_into().expect("sha1 digest is 20 bytes"))
}

/// Convenience wrapper over [`hash`] for string keys (IP addresses, lookup
/// keys).
///
/// # Test
///
/// ```
/// use chord_codec::identifier::hash_str;
///
/// assert_eq!(hash_str("node-a"), hash_str("node-a"));
/// ```
pub fn hash_str(s: &str) -> u32 {
    hash(s.as_bytes())
}
