//! Actor implementation - the single threaded event loop of a node.
//!
//! Owns the sockets, the maintenance scheduler, the search registry and the
//! routing engine. Everything that touches the engine happens here, one event
//! at a time, in the order `mio` delivers them.

mod bootstrap;
mod info;
pub(crate) mod scheduler;
pub(crate) mod socket;

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::{Receiver, Sender, TryRecvError};
use mio::{Events, Poll, Token, Waker};
use tracing::{debug, error, info, trace};

use crate::common::{Id, InfoHash};
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::engine::{AddressFamily, RoutingEngine, VERSION};
use crate::event::{Event, PeerList};
use crate::session::{SearchRegistry, SearchResults};
use crate::{Error, Result};

pub use bootstrap::BootstrapPeer;
pub use info::Info;
pub use scheduler::{Scheduler, Timer, Trigger, FALLBACK_DELAY, MAX_DELAY};
pub use socket::{bind, SocketMux};

pub(crate) const WAKER: Token = Token(2);

/// Maximum nodes exported per address family for the peer list and persistence.
pub const MAX_KNOWN_NODES: usize = 1024;

/// Datagrams processed per readiness notification before yielding to the rest of the loop.
const MAX_DATAGRAMS_PER_WAKEUP: usize = 256;

const EVENTS_CAPACITY: usize = 64;

/// Lookups only, nothing is announced.
const ANNOUNCE_PORT: u16 = 0;

/// Internal Actor driven by [Actor::tick] or by the [crate::Node] thread loop.
pub struct Actor {
    id: Id,
    engine: Box<dyn RoutingEngine + Send>,

    poll: Poll,
    events: Events,
    waker: Arc<Waker>,

    sockets: SocketMux,
    /// Families whose socket may still hold datagrams after the last wakeup.
    pending: Vec<AddressFamily>,
    /// Datagrams read per socket and wakeup.
    datagram_budget: usize,
    scheduler: Scheduler,

    registry: SearchRegistry,
    notify: Sender<Event>,

    shutdown: bool,
}

impl std::fmt::Debug for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("sockets", &self.sockets)
            .field("scheduler", &self.scheduler)
            .field("registry", &self.registry)
            .field("shutdown", &self.shutdown)
            .finish()
    }
}

impl Actor {
    /// Bind the sockets, initialize the engine, ping the bootstrap nodes and
    /// register everything with a new poll instance.
    ///
    /// The first maintenance step runs on the first [Actor::tick].
    pub fn new(
        config: &Config,
        id: Id,
        mut engine: Box<dyn RoutingEngine + Send>,
        notify: Sender<Event>,
    ) -> Result<Self> {
        let mut sockets = SocketMux::bind(config.ipv4, config.ipv6, config.port)
            .inspect_err(|error| error!(?error, "Failed to bind sockets"))?;

        let engine_sockets = sockets.take_engine_sockets().unwrap_or_default();
        engine.initialize(engine_sockets, &id, VERSION).map_err(|e| {
            error!(?e, "Routing engine initialization failed");
            Error::EngineInit(e)
        })?;

        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

        let mut actor = Actor {
            id,
            engine,
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            waker,
            sockets,
            pending: Vec::new(),
            datagram_budget: MAX_DATAGRAMS_PER_WAKEUP,
            scheduler: Scheduler::new(),
            registry: SearchRegistry::new(),
            notify,
            shutdown: false,
        };

        actor.bootstrap(&config.nodes);

        actor.sockets.register(actor.poll.registry())?;

        info!(
            %id,
            v4 = ?actor.local_addr(AddressFamily::V4),
            v6 = ?actor.local_addr(AddressFamily::V6),
            "DHT node listening"
        );

        Ok(actor)
    }

    // === Getters ===

    /// Returns the node's Id
    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn local_addr(&self, family: AddressFamily) -> Option<SocketAddr> {
        self.sockets.local_addr(family)
    }

    pub fn registry(&self) -> &SearchRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Good nodes for IPv4 and IPv6.
    pub fn good_nodes(&self) -> (usize, usize) {
        (
            self.engine.good_nodes(AddressFamily::V4),
            self.engine.good_nodes(AddressFamily::V6),
        )
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Waker that interrupts a blocked [Actor::tick].
    pub fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    pub fn info(&self) -> Info {
        Info::from(self)
    }

    // === Public Methods ===

    /// Wait for the next socket readiness or timer expiry (or a wakeup) and
    /// process it.
    pub fn tick(&mut self) -> std::io::Result<()> {
        if self.shutdown {
            return Ok(());
        }

        let timeout = if self.pending.is_empty() {
            self.scheduler.poll_timeout(Instant::now())
        } else {
            Some(Duration::ZERO)
        };

        if let Err(error) = self.poll.poll(&mut self.events, timeout) {
            if error.kind() == ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(error);
        }

        // (family, revisit): a revisit isn't a readiness notification.
        let mut readable: Vec<(AddressFamily, bool)> = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|family| (family, true))
            .collect();

        for event in self.events.iter() {
            match SocketMux::family(event.token()) {
                Some(family) => match readable.iter_mut().find(|(f, _)| *f == family) {
                    Some(entry) => entry.1 = false,
                    None => readable.push((family, false)),
                },
                None => trace!(token = ?event.token(), "Woken up"),
            }
        }

        for (family, revisit) in readable {
            self.on_readable(family, revisit);
        }

        if self.scheduler.is_due(Instant::now()) {
            self.on_timer();
        }

        Ok(())
    }

    /// Start a search for `info_hash`, or restart it keeping the results
    /// found so far.
    ///
    /// Returns `true` if a new session was created.
    pub fn start_search(&mut self, info_hash: InfoHash) -> bool {
        let (session, created) = self.registry.get_or_create(info_hash);

        if created {
            debug!(%info_hash, "Start a search");
            self.emit(Event::SearchCreated(info_hash));
        } else {
            debug!(%info_hash, "Restart search");
            session.restart();
        }

        self.start_lookup(info_hash);

        created
    }

    /// Restart the lookup of an existing search, keeping its results.
    ///
    /// Returns `false` (and does nothing) if there is no such search.
    pub fn refresh_search(&mut self, info_hash: &InfoHash) -> bool {
        match self.registry.find_mut(info_hash) {
            Some(session) => {
                debug!(%info_hash, "Restarting search");
                session.restart();
                self.start_lookup(*info_hash);
                true
            }
            None => false,
        }
    }

    /// Forget a search. Later callbacks for it are discarded.
    pub fn clear_search(&mut self, info_hash: &InfoHash) -> bool {
        let removed = self.registry.remove(info_hash).is_some();
        if removed {
            debug!(%info_hash, "Cleared search");
        }
        removed
    }

    /// Newline joined results of a search.
    pub fn export(&self, info_hash: &InfoHash) -> Option<String> {
        self.registry.find(info_hash).map(|s| s.export())
    }

    pub fn search_results(&self, info_hash: &InfoHash) -> Option<SearchResults> {
        self.registry.find(info_hash).map(SearchResults::from)
    }

    /// Snapshot of the known nodes and good node counts.
    pub fn peer_list(&self) -> PeerList {
        let (good_v4, good_v6) = self.good_nodes();

        PeerList {
            nodes: self
                .engine
                .known_nodes(MAX_KNOWN_NODES, MAX_KNOWN_NODES)
                .to_sorted(),
            good_v4,
            good_v6,
        }
    }

    /// Stop the engine and release the sockets and timer.
    ///
    /// Returns the known nodes as `host:port` to persist as bootstrap nodes.
    /// Calling it again returns an empty list.
    pub fn shutdown(&mut self) -> Vec<String> {
        if self.shutdown {
            return Vec::new();
        }

        let nodes = self
            .engine
            .known_nodes(MAX_KNOWN_NODES, MAX_KNOWN_NODES)
            .to_bootstrap();

        self.engine.shutdown();
        self.sockets.deregister(self.poll.registry());
        self.sockets.close();
        self.scheduler.stop();
        self.pending.clear();
        self.shutdown = true;

        debug!(nodes = nodes.len(), "Node shutdown");

        nodes
    }

    // === Private Methods ===

    pub(crate) fn run(mut self, receiver: Receiver<ActorMessage>) {
        while !self.shutdown {
            if let Err(error) = self.tick() {
                error!(?error, "Poll failed, shutting down");
                self.shutdown();
                break;
            }

            self.handle_messages(&receiver);
        }

        // Dropping the reply senders fails requests that raced the shutdown.
        receiver.drain().for_each(drop);
    }

    fn handle_messages(&mut self, receiver: &Receiver<ActorMessage>) {
        loop {
            match receiver.try_recv() {
                Ok(message) => self.handle_message(message),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    // Every Node handle was dropped.
                    debug!("Node handles dropped, shutting down actor");
                    self.shutdown();
                    return;
                }
            }

            if self.shutdown {
                return;
            }
        }
    }

    fn handle_message(&mut self, message: ActorMessage) {
        match message {
            ActorMessage::Search(info_hash, sender) => {
                let _ = sender.send(self.start_search(info_hash));
            }
            ActorMessage::Refresh(info_hash, sender) => {
                let _ = sender.send(self.refresh_search(&info_hash));
            }
            ActorMessage::Clear(info_hash, sender) => {
                let _ = sender.send(self.clear_search(&info_hash));
            }
            ActorMessage::Export(info_hash, sender) => {
                let _ = sender.send(self.export(&info_hash));
            }
            ActorMessage::Results(info_hash, sender) => {
                let _ = sender.send(self.search_results(&info_hash));
            }
            ActorMessage::Searches(sender) => {
                let _ = sender.send(self.registry.info_hashes());
            }
            ActorMessage::Info(sender) => {
                let _ = sender.send(self.info());
            }
            ActorMessage::Shutdown(sender) => {
                let _ = sender.send(self.shutdown());
            }
        }
    }

    /// Run one step per queued datagram; a notification that finds the socket
    /// empty still runs one step without a datagram, a revisit doesn't.
    fn on_readable(&mut self, family: AddressFamily, revisit: bool) {
        trace!(%family, revisit, "Socket activated");

        let mut drain = Drain::new(self.datagram_budget, revisit);

        loop {
            let (read, datagram) = match self.sockets.receive(family) {
                Ok(Some(datagram)) => (Read::Datagram, Some(datagram)),
                Ok(None) => (Read::Empty, None),
                Err(_) => (Read::Failed, None),
            };

            let (step, next) = drain.on_read(read);

            if step {
                let mut dispatcher = Dispatcher::new(&mut self.registry, &self.notify);
                self.scheduler.step(
                    Trigger::Readable,
                    self.engine.as_mut(),
                    datagram,
                    &mut dispatcher,
                );
                self.refresh_peers();
            }

            match next {
                Next::Read => continue,
                Next::Done => return,
                Next::Revisit => {
                    // Edge triggered readiness won't fire again until the socket is drained.
                    self.pending.push(family);
                    return;
                }
            }
        }
    }

    fn on_timer(&mut self) {
        trace!("Timer expired");

        let mut dispatcher = Dispatcher::new(&mut self.registry, &self.notify);
        self.scheduler
            .step(Trigger::Timer, self.engine.as_mut(), None, &mut dispatcher);
        self.refresh_peers();
    }

    fn refresh_peers(&self) {
        self.emit(Event::PeersRefreshed(self.peer_list()));
    }

    fn start_lookup(&mut self, info_hash: InfoHash) {
        let mut dispatcher = Dispatcher::new(&mut self.registry, &self.notify);

        if let Err(error) = self.engine.start_lookup(
            &info_hash,
            ANNOUNCE_PORT,
            AddressFamily::V4,
            &mut dispatcher,
        ) {
            debug!(%info_hash, ?error, "Failed to start lookup");
        }
    }

    /// Ping every IPv4 bootstrap node. IPv6 bootstrapping is not supported.
    fn bootstrap(&mut self, nodes: &[String]) {
        for node in nodes {
            let Some(peer) = BootstrapPeer::parse(node) else {
                debug!(node, "Skipping invalid bootstrap node");
                continue;
            };

            match peer.address {
                SocketAddr::V4(_) => match self.engine.ping_node(peer.address) {
                    Ok(heard) if heard > 0 => debug!(node, "Bootstrapped"),
                    result => debug!(node, ?result, "Bootstrapping failed"),
                },
                SocketAddr::V6(_) => debug!(node, "Bootstrapping from IPv6 not implemented"),
            }
        }
    }

    fn emit(&self, event: Event) {
        let _ = self.notify.send(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Read {
    Datagram,
    /// The socket reported nothing queued.
    Empty,
    /// The read failed, datagrams may still be queued.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    Read,
    Done,
    /// Stop for now and come back on the next loop iteration.
    Revisit,
}

/// Bookkeeping of one pass over a readable socket.
#[derive(Debug)]
struct Drain {
    remaining: usize,
    revisit: bool,
    stepped: bool,
}

impl Drain {
    fn new(budget: usize, revisit: bool) -> Self {
        Drain {
            remaining: budget,
            revisit,
            stepped: false,
        }
    }

    /// Returns whether `read` gets a maintenance step, and how the pass goes on.
    fn on_read(&mut self, read: Read) -> (bool, Next) {
        let step = read == Read::Datagram || (!self.stepped && !self.revisit);
        self.stepped |= step;

        let next = match read {
            Read::Datagram => {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    Next::Revisit
                } else {
                    Next::Read
                }
            }
            Read::Empty => Next::Done,
            Read::Failed => Next::Revisit,
        };

        (step, next)
    }
}

#[derive(Debug)]
pub(crate) enum ActorMessage {
    Search(InfoHash, Sender<bool>),
    Refresh(InfoHash, Sender<bool>),
    Clear(InfoHash, Sender<bool>),
    Export(InfoHash, Sender<Option<String>>),
    Results(InfoHash, Sender<Option<SearchResults>>),
    Searches(Sender<Vec<InfoHash>>),
    Info(Sender<Info>),
    Shutdown(Sender<Vec<String>>),
}
