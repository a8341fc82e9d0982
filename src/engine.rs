//! Contract with the routing engine: the routing table and K-RPC wire protocol
//! implementation this node drives but does not implement itself.

use std::fmt::{self, Display, Formatter};
use std::net::{SocketAddr, SocketAddrV4, SocketAddrV6, UdpSocket};

use crate::common::{Id, InfoHash, ID_SIZE};

/// Version tag announced by this client in outgoing messages.
pub const VERSION: [u8; 4] = *b"AFG\0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn of(address: &SocketAddr) -> Self {
        match address {
            SocketAddr::V4(_) => AddressFamily::V4,
            SocketAddr::V6(_) => AddressFamily::V6,
        }
    }
}

impl Display for AddressFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => write!(f, "IPv4"),
            AddressFamily::V6 => write!(f, "IPv6"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("routing engine returned {code}")]
/// Failure status reported by a [RoutingEngine] call.
pub struct EngineError {
    pub code: i32,
}

impl EngineError {
    pub fn new(code: i32) -> Self {
        EngineError { code }
    }
}

/// An inbound datagram handed to [RoutingEngine::maintain].
#[derive(Debug, Clone, Copy)]
pub struct Datagram<'a> {
    pub bytes: &'a [u8],
    pub from: SocketAddr,
}

/// Sockets the engine sends on. These are clones of the sockets owned by the
/// socket multiplexer; the engine never reads from them.
#[derive(Debug, Default)]
pub struct EngineSockets {
    pub v4: Option<UdpSocket>,
    pub v6: Option<UdpSocket>,
}

/// Nodes exported from the routing table, each with its own port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownNodes {
    pub v4: Vec<SocketAddrV4>,
    pub v6: Vec<SocketAddrV6>,
}

impl KnownNodes {
    pub fn len(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }

    /// All nodes as socket addresses, sorted.
    pub fn to_sorted(&self) -> Vec<SocketAddr> {
        let mut nodes: Vec<SocketAddr> = self
            .v4
            .iter()
            .map(|a| SocketAddr::V4(*a))
            .chain(self.v6.iter().map(|a| SocketAddr::V6(*a)))
            .collect();
        nodes.sort();
        nodes
    }

    /// `host:port` strings suitable for persisting as bootstrap nodes.
    pub fn to_bootstrap(&self) -> Vec<String> {
        self.to_sorted().iter().map(|a| a.to_string()).collect()
    }
}

/// Result event raised by the engine, decoded once at the engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent<'a> {
    /// Compact IPv4 peers (6 bytes each) found for `info_hash`.
    Values {
        info_hash: InfoHash,
        peers: &'a [u8],
    },
    /// Compact IPv6 peers (18 bytes each) found for `info_hash`. Not supported.
    Values6 {
        info_hash: InfoHash,
        peers: &'a [u8],
    },
    /// The IPv4 lookup for `info_hash` completed.
    SearchDone { info_hash: InfoHash },
    /// The IPv6 lookup for `info_hash` completed. Not supported.
    SearchDone6 { info_hash: InfoHash },
}

/// Raw event kinds used by callback based engines.
pub mod kind {
    pub const NONE: u8 = 0;
    pub const VALUES: u8 = 1;
    pub const VALUES6: u8 = 2;
    pub const SEARCH_DONE: u8 = 3;
    pub const SEARCH_DONE6: u8 = 4;
}

impl<'a> EngineEvent<'a> {
    /// Decode a raw `(kind, info_hash, data)` callback triple.
    ///
    /// Returns `None` for [kind::NONE] and unknown kinds.
    pub fn decode(kind: u8, info_hash: &[u8; ID_SIZE], data: &'a [u8]) -> Option<Self> {
        let info_hash = Id(*info_hash);

        match kind {
            kind::VALUES => Some(EngineEvent::Values {
                info_hash,
                peers: data,
            }),
            kind::VALUES6 => Some(EngineEvent::Values6 {
                info_hash,
                peers: data,
            }),
            kind::SEARCH_DONE => Some(EngineEvent::SearchDone { info_hash }),
            kind::SEARCH_DONE6 => Some(EngineEvent::SearchDone6 { info_hash }),
            _ => None,
        }
    }

    pub fn info_hash(&self) -> &InfoHash {
        match self {
            EngineEvent::Values { info_hash, .. }
            | EngineEvent::Values6 { info_hash, .. }
            | EngineEvent::SearchDone { info_hash }
            | EngineEvent::SearchDone6 { info_hash } => info_hash,
        }
    }
}

/// Receiver of [EngineEvent]s, called synchronously from inside engine calls.
pub trait EventSink {
    fn on_event(&mut self, event: EngineEvent<'_>);
}

/// A single threaded, non-reentrant DHT routing engine.
///
/// None of these methods may be called while another one is still executing,
/// the [crate::Actor] guarantees this by owning the engine exclusively.
pub trait RoutingEngine {
    /// Set up the engine with the sockets to send on and this node's Id.
    fn initialize(
        &mut self,
        sockets: EngineSockets,
        id: &Id,
        version: [u8; 4],
    ) -> Result<(), EngineError>;

    /// Run one maintenance step, optionally processing one inbound datagram.
    ///
    /// Returns the number of seconds until the engine wants to be called again.
    /// An `Err` means the returned delay can't be trusted.
    fn maintain(
        &mut self,
        datagram: Option<Datagram<'_>>,
        sink: &mut dyn EventSink,
    ) -> Result<i64, EngineError>;

    /// Start (or restart) a `get_peers` lookup for `info_hash`.
    ///
    /// `announce_port` 0 means only look up, don't announce.
    fn start_lookup(
        &mut self,
        info_hash: &InfoHash,
        announce_port: u16,
        family: AddressFamily,
        sink: &mut dyn EventSink,
    ) -> Result<(), EngineError>;

    /// Ping a bootstrap node, returns how many nodes the engine has heard of so far.
    fn ping_node(&mut self, address: SocketAddr) -> Result<usize, EngineError>;

    /// Number of good nodes in the routing table for `family`.
    fn good_nodes(&self, family: AddressFamily) -> usize;

    /// Export up to `max_v4` IPv4 and `max_v6` IPv6 known nodes.
    fn known_nodes(&self, max_v4: usize, max_v6: usize) -> KnownNodes;

    fn shutdown(&mut self);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_event_kinds() {
        let hash = [7; ID_SIZE];
        let data = [1, 2, 3, 4, 5, 6];

        assert_eq!(
            EngineEvent::decode(kind::VALUES, &hash, &data),
            Some(EngineEvent::Values {
                info_hash: Id(hash),
                peers: &data
            })
        );
        assert_eq!(
            EngineEvent::decode(kind::SEARCH_DONE, &hash, &[]),
            Some(EngineEvent::SearchDone {
                info_hash: Id(hash)
            })
        );
        assert!(matches!(
            EngineEvent::decode(kind::VALUES6, &hash, &data),
            Some(EngineEvent::Values6 { .. })
        ));
        assert_eq!(EngineEvent::decode(kind::NONE, &hash, &data), None);
        assert_eq!(EngineEvent::decode(42, &hash, &data), None);
    }

    #[test]
    fn known_nodes_keep_their_own_port() {
        let nodes = KnownNodes {
            v4: vec!["10.0.0.2:6881".parse().unwrap(), "10.0.0.1:1000".parse().unwrap()],
            v6: vec!["[2001:db8::1]:51413".parse().unwrap()],
        };

        assert_eq!(
            nodes.to_bootstrap(),
            vec!["10.0.0.1:1000", "10.0.0.2:6881", "[2001:db8::1]:51413"]
        );
        assert_eq!(nodes.len(), 3);
    }
}
