//! Scripted routing engine shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use dht_explorer::{
    AddressFamily, Config, Datagram, EngineError, EngineEvent, EngineSockets, Event, EventSink,
    Id, InfoHash, KnownNodes, RoutingEngine,
};

/// Compact record of 192.168.1.5:6881.
pub const PEER_192_168_1_5: [u8; 6] = [192, 168, 1, 5, 0x1a, 0xe1];

/// Route the node's `tracing` output through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub fn info_hash(byte: u8) -> InfoHash {
    Id([byte; 20])
}

/// Loopback only config on an ephemeral port, without bootstrap nodes.
pub fn test_config() -> Config {
    init_tracing();

    Config {
        port: 0,
        nodes: vec![],
        ..Default::default()
    }
}

/// A raw event delivered on the next engine call that takes a sink.
#[derive(Debug, Clone)]
pub struct Scripted {
    pub kind: u8,
    pub info_hash: [u8; 20],
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub initialized: Option<(Id, [u8; 4])>,
    pub sockets: Option<EngineSockets>,
    pub maintain_calls: Vec<Option<Vec<u8>>>,
    /// Results of the next `maintain` calls, `default_delay` once empty.
    pub delays: VecDeque<Result<i64, EngineError>>,
    pub default_delay: i64,
    pub script: VecDeque<Scripted>,
    pub lookups: Vec<(InfoHash, u16, AddressFamily)>,
    pub pings: Vec<SocketAddr>,
    pub known: KnownNodes,
    pub good: (usize, usize),
    pub init_error: Option<EngineError>,
    pub shutdown_calls: usize,
    in_call: bool,
    pub reentered: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    /// An engine asking to be called again after `default_delay` seconds.
    pub fn new(default_delay: i64) -> Self {
        let engine = MockEngine::default();
        engine.state().default_delay = default_delay;
        engine
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn push_event(&self, kind: u8, info_hash: InfoHash, data: &[u8]) {
        self.state().script.push_back(Scripted {
            kind,
            info_hash: info_hash.0,
            data: data.to_vec(),
        });
    }

    fn enter(&self) {
        let mut state = self.state();
        if state.in_call {
            state.reentered = true;
        }
        state.in_call = true;
    }

    fn leave(&self) {
        self.state().in_call = false;
    }

    fn deliver(&self, sink: &mut dyn EventSink) {
        let script: Vec<Scripted> = self.state().script.drain(..).collect();

        for raw in script {
            if let Some(event) = EngineEvent::decode(raw.kind, &raw.info_hash, &raw.data) {
                sink.on_event(event);
            }
        }
    }
}

impl RoutingEngine for MockEngine {
    fn initialize(
        &mut self,
        sockets: EngineSockets,
        id: &Id,
        version: [u8; 4],
    ) -> Result<(), EngineError> {
        let mut state = self.state();
        if let Some(error) = state.init_error {
            return Err(error);
        }
        state.initialized = Some((*id, version));
        state.sockets = Some(sockets);
        Ok(())
    }

    fn maintain(
        &mut self,
        datagram: Option<Datagram<'_>>,
        sink: &mut dyn EventSink,
    ) -> Result<i64, EngineError> {
        self.enter();
        self.state()
            .maintain_calls
            .push(datagram.map(|d| d.bytes.to_vec()));
        self.deliver(sink);
        self.leave();

        let mut state = self.state();
        let default_delay = state.default_delay;
        state.delays.pop_front().unwrap_or(Ok(default_delay))
    }

    fn start_lookup(
        &mut self,
        info_hash: &InfoHash,
        announce_port: u16,
        family: AddressFamily,
        _sink: &mut dyn EventSink,
    ) -> Result<(), EngineError> {
        self.enter();
        self.state()
            .lookups
            .push((*info_hash, announce_port, family));
        self.leave();
        Ok(())
    }

    fn ping_node(&mut self, address: SocketAddr) -> Result<usize, EngineError> {
        let mut state = self.state();
        state.pings.push(address);
        Ok(state.pings.len())
    }

    fn good_nodes(&self, family: AddressFamily) -> usize {
        let good = self.state().good;
        match family {
            AddressFamily::V4 => good.0,
            AddressFamily::V6 => good.1,
        }
    }

    fn known_nodes(&self, max_v4: usize, max_v6: usize) -> KnownNodes {
        let known = &self.state().known;
        KnownNodes {
            v4: known.v4.iter().take(max_v4).copied().collect(),
            v6: known.v6.iter().take(max_v6).copied().collect(),
        }
    }

    fn shutdown(&mut self) {
        let mut state = self.state();
        state.sockets = None;
        state.shutdown_calls += 1;
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Events queued so far, ignoring the peer list refreshes.
pub fn search_events(events: &flume::Receiver<Event>) -> Vec<Event> {
    events
        .try_iter()
        .filter(|e| !matches!(e, Event::PeersRefreshed(_)))
        .collect()
}
