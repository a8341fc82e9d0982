//! Bootstrap entries from the config.

use std::net::{SocketAddr, ToSocketAddrs};

use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A configured `host:port` entry resolved to the address to ping.
pub struct BootstrapPeer {
    pub address: SocketAddr,
}

impl BootstrapPeer {
    /// Resolve `host:port`, preferring an IPv4 address when the host has both.
    pub fn parse(node: &str) -> Option<Self> {
        let addresses: Vec<SocketAddr> = match node.trim().to_socket_addrs() {
            Ok(addresses) => addresses.collect(),
            Err(error) => {
                trace!(node, ?error, "Unresolvable bootstrap node");
                return None;
            }
        };

        addresses
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addresses.first())
            .map(|address| BootstrapPeer { address: *address })
    }
}
