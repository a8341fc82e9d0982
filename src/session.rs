//! Search sessions, one per info-hash the user looked up.

use std::collections::{HashMap, HashSet};

use crate::common::{InfoHash, PeerEndpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// A lookup was started or restarted and hasn't reported completion yet.
    Active,
    /// The engine reported the last lookup as complete.
    Done,
}

#[derive(Debug, Clone)]
/// Accumulated results of the lookups for one info-hash.
pub struct SearchSession {
    info_hash: InfoHash,
    results: HashSet<PeerEndpoint>,
    state: SessionState,
}

impl SearchSession {
    pub fn new(info_hash: InfoHash) -> Self {
        SearchSession {
            info_hash,
            results: HashSet::new(),
            state: SessionState::Active,
        }
    }

    // === Getters ===

    pub fn info_hash(&self) -> &InfoHash {
        &self.info_hash
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == SessionState::Done
    }

    pub fn results(&self) -> &HashSet<PeerEndpoint> {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results sorted by address then port.
    pub fn sorted_results(&self) -> Vec<PeerEndpoint> {
        let mut results: Vec<_> = self.results.iter().copied().collect();
        results.sort();
        results
    }

    /// Newline separated `ip:port` list of the results.
    pub fn export(&self) -> String {
        self.sorted_results()
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    // === Public Methods ===

    /// Add peers, returns how many of them were new.
    pub fn insert_peers<I: IntoIterator<Item = PeerEndpoint>>(&mut self, peers: I) -> usize {
        peers
            .into_iter()
            .filter(|peer| self.results.insert(*peer))
            .count()
    }

    /// Mark a (re)started lookup. Results are kept.
    pub fn restart(&mut self) {
        self.state = SessionState::Active;
    }

    pub fn mark_done(&mut self) {
        self.state = SessionState::Done;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Owned snapshot of a [SearchSession] handed out of the actor thread.
pub struct SearchResults {
    pub info_hash: InfoHash,
    pub state: SessionState,
    pub peers: Vec<PeerEndpoint>,
}

impl From<&SearchSession> for SearchResults {
    fn from(session: &SearchSession) -> Self {
        SearchResults {
            info_hash: session.info_hash,
            state: session.state,
            peers: session.sorted_results(),
        }
    }
}

#[derive(Debug, Default)]
/// At most one [SearchSession] per info-hash.
pub struct SearchRegistry {
    sessions: HashMap<InfoHash, SearchSession>,
}

impl SearchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `info_hash`, creating an empty active one if absent.
    ///
    /// The boolean is `true` if the session was just created.
    pub fn get_or_create(&mut self, info_hash: InfoHash) -> (&mut SearchSession, bool) {
        let mut created = false;

        let session = self.sessions.entry(info_hash).or_insert_with(|| {
            created = true;
            SearchSession::new(info_hash)
        });

        (session, created)
    }

    pub fn find(&self, info_hash: &InfoHash) -> Option<&SearchSession> {
        self.sessions.get(info_hash)
    }

    pub fn find_mut(&mut self, info_hash: &InfoHash) -> Option<&mut SearchSession> {
        self.sessions.get_mut(info_hash)
    }

    /// Remove the session for `info_hash`, a no-op if there is none.
    pub fn remove(&mut self, info_hash: &InfoHash) -> Option<SearchSession> {
        self.sessions.remove(info_hash)
    }

    pub fn contains(&self, info_hash: &InfoHash) -> bool {
        self.sessions.contains_key(info_hash)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Info-hashes of all sessions, sorted.
    pub fn info_hashes(&self) -> Vec<InfoHash> {
        let mut hashes: Vec<_> = self.sessions.keys().copied().collect();
        hashes.sort();
        hashes
    }
}

#[cfg(test)]
mod test {
    use crate::common::Id;

    use super::*;

    fn peer(last: u8, port: u16) -> PeerEndpoint {
        PeerEndpoint::new([10, 0, 0, last].into(), port)
    }

    #[test]
    fn get_or_create_keeps_existing_results() {
        let mut registry = SearchRegistry::new();
        let info_hash = Id([1; 20]);

        let (session, created) = registry.get_or_create(info_hash);
        assert!(created);
        session.insert_peers([peer(1, 80)]);
        session.mark_done();

        let (session, created) = registry.get_or_create(info_hash);
        assert!(!created);
        assert_eq!(session.len(), 1);
        assert!(session.is_done());

        session.restart();
        session.insert_peers([peer(2, 80)]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find(&info_hash).unwrap().len(), 2);
        assert_eq!(
            registry.find(&info_hash).unwrap().state(),
            SessionState::Active
        );
    }

    #[test]
    fn sessions_are_independent() {
        let mut registry = SearchRegistry::new();
        let h1 = Id([1; 20]);
        let h2 = Id([2; 20]);

        registry.get_or_create(h1);
        registry.get_or_create(h2);

        registry.find_mut(&h1).unwrap().insert_peers([peer(1, 80)]);

        assert_eq!(registry.find(&h1).unwrap().len(), 1);
        assert!(registry.find(&h2).unwrap().is_empty());
        assert_eq!(registry.info_hashes(), vec![h1, h2]);
    }

    #[test]
    fn duplicates_are_not_inserted() {
        let mut session = SearchSession::new(Id([0; 20]));

        assert_eq!(session.insert_peers([peer(1, 80)]), 1);
        assert_eq!(session.insert_peers([peer(1, 80), peer(1, 80)]), 0);
        assert_eq!(session.insert_peers([peer(1, 81)]), 1);

        assert_eq!(session.len(), 2);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = SearchRegistry::new();
        let info_hash = Id([3; 20]);

        registry.get_or_create(info_hash);

        assert!(registry.remove(&info_hash).is_some());
        assert!(registry.remove(&info_hash).is_none());
        assert!(registry.find(&info_hash).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn export_is_newline_joined() {
        let mut session = SearchSession::new(Id([0; 20]));
        session.insert_peers([peer(2, 6881), peer(1, 51413)]);

        assert_eq!(session.export(), "10.0.0.1:51413\n10.0.0.2:6881");
        assert_eq!(SearchSession::new(Id([0; 20])).export(), "");
    }
}
