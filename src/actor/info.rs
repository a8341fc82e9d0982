use std::net::SocketAddr;

use crate::engine::AddressFamily;
use crate::Id;

use super::Actor;

/// Information and statistics about this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    id: Id,
    local_addr_v4: Option<SocketAddr>,
    local_addr_v6: Option<SocketAddr>,
    good_nodes: (usize, usize),
    searches: usize,
    maintenance_steps: u64,
}

impl Info {
    /// This Node's [Id]
    pub fn id(&self) -> &Id {
        &self.id
    }
    /// Local UDP address of the IPv4 socket, if bound.
    pub fn local_addr_v4(&self) -> Option<SocketAddr> {
        self.local_addr_v4
    }
    /// Local UDP address of the IPv6 socket, if bound.
    pub fn local_addr_v6(&self) -> Option<SocketAddr> {
        self.local_addr_v6
    }
    /// Good nodes in the routing table, IPv4 and IPv6.
    pub fn good_nodes(&self) -> (usize, usize) {
        self.good_nodes
    }
    /// Number of search sessions.
    pub fn searches(&self) -> usize {
        self.searches
    }
    pub fn maintenance_steps(&self) -> u64 {
        self.maintenance_steps
    }
}

impl From<&Actor> for Info {
    fn from(actor: &Actor) -> Self {
        Self {
            id: *actor.id(),
            local_addr_v4: actor.local_addr(AddressFamily::V4),
            local_addr_v6: actor.local_addr(AddressFamily::V6),
            good_nodes: actor.good_nodes(),
            searches: actor.registry().len(),
            maintenance_steps: actor.scheduler().steps(),
        }
    }
}
