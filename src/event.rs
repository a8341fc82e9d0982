//! Notifications emitted to the user interface.

use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;

use crate::common::InfoHash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Emitted after every maintenance step.
    PeersRefreshed(PeerList),
    /// A search was started for a hash that had no session.
    SearchCreated(InfoHash),
    /// New values arrived for a search.
    SearchUpdated(InfoHash),
    /// The engine reported the lookup for a search as complete.
    SearchDone(InfoHash),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Snapshot of the routing table for display.
pub struct PeerList {
    /// Known nodes of both families, sorted.
    pub nodes: Vec<SocketAddr>,
    pub good_v4: usize,
    pub good_v6: usize,
}

impl Display for PeerList {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Peers: {}+{}", self.good_v4, self.good_v6)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_line() {
        let list = PeerList {
            nodes: vec![],
            good_v4: 12,
            good_v6: 0,
        };

        assert_eq!(list.to_string(), "Peers: 12+0");
    }
}
