//! Peer endpoints as returned by `get_peers` lookups.
use std::{
    fmt::{self, Display, Formatter},
    net::{Ipv4Addr, SocketAddrV4},
};

/// Size of a compact IPv4 peer record: 4 bytes address, 2 bytes big-endian port.
pub const COMPACT_PEER_SIZE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// An IPv4 address and port of a peer serving some info-hash.
///
/// Equality (and therefore deduplication) is over both address and port.
pub struct PeerEndpoint(SocketAddrV4);

impl PeerEndpoint {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        PeerEndpoint(SocketAddrV4::new(ip, port))
    }

    /// Decode one compact peer record, returns `None` unless `bytes` is exactly
    /// [COMPACT_PEER_SIZE] long.
    pub fn from_compact(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [a, b, c, d, p0, p1] => Some(PeerEndpoint::new(
                Ipv4Addr::new(*a, *b, *c, *d),
                u16::from_be_bytes([*p0, *p1]),
            )),
            _ => None,
        }
    }

    pub fn address(&self) -> SocketAddrV4 {
        self.0
    }
}

impl From<SocketAddrV4> for PeerEndpoint {
    fn from(address: SocketAddrV4) -> Self {
        PeerEndpoint(address)
    }
}

impl Display for PeerEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decode a packed sequence of compact peer records.
///
/// Only whole records are decoded, a trailing partial record is ignored.
pub fn decode_compact_peers(data: &[u8]) -> impl Iterator<Item = PeerEndpoint> + '_ {
    data.chunks_exact(COMPACT_PEER_SIZE)
        .filter_map(PeerEndpoint::from_compact)
}
