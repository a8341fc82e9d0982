//! Hashing and randomness primitives a [crate::RoutingEngine] needs from its host.

use std::net::SocketAddr;

use rand::{rngs::OsRng, RngCore};
use sha1_smol::Sha1;

/// SHA-1 digest length in bytes.
pub const DIGEST_SIZE: usize = 20;

/// Hash the concatenation of three buffers with SHA-1 into `out`.
///
/// If `out` is longer than the digest, the remainder is zero filled,
/// if it is shorter, the digest is truncated.
pub fn hash(out: &mut [u8], v1: &[u8], v2: &[u8], v3: &[u8]) {
    let mut hasher = Sha1::new();
    hasher.update(v1);
    hasher.update(v2);
    hasher.update(v3);

    let digest = hasher.digest().bytes();

    let n = out.len().min(DIGEST_SIZE);
    out[..n].copy_from_slice(&digest[..n]);
    out[n..].fill(0);
}

/// Fill `buf` from the operating system random source.
pub fn random_bytes(buf: &mut [u8]) -> Result<(), rand::Error> {
    OsRng.try_fill_bytes(buf)
}

/// Whether traffic from `address` should be dropped. Nothing is blacklisted.
pub fn blacklisted(_address: &SocketAddr) -> bool {
    false
}
