//! Client core of a BitTorrent Mainline DHT explorer.
//!
//! A [Node] owns a pair of UDP sockets and drives a [RoutingEngine] from a
//! single event loop: every readable datagram and every expiry of the
//! engine-requested timer runs exactly one maintenance step. Peer lookups are
//! tracked as search sessions, one per info-hash, and results are reported as
//! [Event]s.
//!
//! ```no_run
//! # fn run(engine: impl dht_explorer::RoutingEngine + Send + 'static) -> Result<(), Box<dyn std::error::Error>> {
//! use dht_explorer::{ConfigFile, Event, Node};
//!
//! let file = ConfigFile::default_location();
//! let mut config = file.load()?;
//!
//! let (node, events) = Node::start(&mut config, engine)?;
//!
//! node.search("0123456789abcdef0123456789abcdef01234567".parse()?)?;
//!
//! for event in events.iter() {
//!     if let Event::SearchDone(info_hash) = event {
//!         println!("{}", node.export(info_hash)?.unwrap_or_default());
//!         break;
//!     }
//! }
//!
//! config.nodes = node.shutdown()?;
//! file.save(&config)?;
//! # Ok(())
//! # }
//! ```

// Public modules
pub mod actor;
mod common;
mod config;
mod dispatcher;
mod engine;
mod error;
mod event;
mod identity;
mod node;
mod session;
pub mod utils;

pub use crate::actor::{Actor, Info, Scheduler, SocketMux};
pub use crate::common::{decode_compact_peers, Id, InfoHash, PeerEndpoint, COMPACT_PEER_SIZE, ID_SIZE};
pub use config::{Config, ConfigFile, DEFAULT_BOOTSTRAP_NODES, DEFAULT_PORT};
pub use dispatcher::Dispatcher;
pub use engine::{
    kind, AddressFamily, Datagram, EngineError, EngineEvent, EngineSockets, EventSink,
    KnownNodes, RoutingEngine, VERSION,
};
pub use error::{Error, Result};
pub use event::{Event, PeerList};
pub use identity::{obtain_identity, Identity};
pub use node::{Node, NodeWasShutdown};
pub use session::{SearchRegistry, SearchResults, SearchSession, SessionState};
