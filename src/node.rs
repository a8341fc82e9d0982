//! Node handle, the thread safe front of the [Actor].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use flume::{Receiver, Sender};
use mio::Waker;
use tracing::{debug, error};

use crate::actor::{Actor, ActorMessage, Info};
use crate::common::InfoHash;
use crate::config::Config;
use crate::engine::RoutingEngine;
use crate::event::Event;
use crate::identity::obtain_identity;
use crate::session::SearchResults;
use crate::{Error, Result};

#[derive(Debug, Clone)]
/// Handle to a DHT explorer node running on its own thread.
///
/// Cloning is cheap, all clones talk to the same actor. The actor shuts down
/// when [Node::shutdown] is called or the last handle is dropped.
pub struct Node(Arc<Handle>);

#[derive(Debug)]
struct Handle {
    /// Always `Some` until the handle is dropped.
    sender: Option<Sender<ActorMessage>>,
    waker: Arc<Waker>,
    /// Set once any handle shut the actor down.
    shutdown: AtomicBool,
}

impl Drop for Handle {
    fn drop(&mut self) {
        // Disconnect first, so the woken actor sees no senders left.
        drop(self.sender.take());

        if !self.shutdown.load(Ordering::Acquire) {
            debug!("Last node handle dropped, stopping actor");
            let _ = self.waker.wake();
        }
    }
}

impl Node {
    /// Start a node driving `engine`, returns the handle and the stream of
    /// [Event]s for the user interface.
    ///
    /// If `config` has no valid persisted id, a new one is generated and
    /// written back to `config.id` so the caller can save it.
    pub fn start<E>(config: &mut Config, engine: E) -> Result<(Node, Receiver<Event>)>
    where
        E: RoutingEngine + Send + 'static,
    {
        let identity = obtain_identity(config.id.as_deref())?;
        if identity.generated {
            config.id = Some(identity.id.to_hex());
        }

        let (sender, receiver) = flume::unbounded();
        let (notify, events) = flume::unbounded();
        let (ready_sender, ready) = flume::bounded::<Result<Arc<Waker>>>(1);

        let actor_config = config.clone();

        thread::Builder::new()
            .name("dht-explorer".to_string())
            .spawn(move || {
                match Actor::new(&actor_config, identity.id, Box::new(engine), notify) {
                    Ok(actor) => {
                        let _ = ready_sender.send(Ok(actor.waker()));
                        actor.run(receiver);
                    }
                    Err(error) => {
                        let _ = ready_sender.send(Err(error));
                    }
                }
            })?;

        let waker = ready.recv().map_err(|_| {
            error!("Actor thread exited before starting");
            Error::IO(std::io::Error::other("actor thread exited before starting"))
        })??;

        Ok((
            Node(Arc::new(Handle {
                sender: Some(sender),
                waker,
                shutdown: AtomicBool::new(false),
            })),
            events,
        ))
    }

    // === Getters ===

    /// Information and statistics about this node.
    pub fn info(&self) -> Result<Info, NodeWasShutdown> {
        self.request(ActorMessage::Info)
    }

    /// Info-hashes of all current searches, sorted.
    pub fn searches(&self) -> Result<Vec<InfoHash>, NodeWasShutdown> {
        self.request(ActorMessage::Searches)
    }

    /// Snapshot of a search, `None` if there is no search for `info_hash`.
    pub fn search_results(
        &self,
        info_hash: InfoHash,
    ) -> Result<Option<SearchResults>, NodeWasShutdown> {
        self.request(|sender| ActorMessage::Results(info_hash, sender))
    }

    /// Newline separated `ip:port` results of a search.
    pub fn export(&self, info_hash: InfoHash) -> Result<Option<String>, NodeWasShutdown> {
        self.request(|sender| ActorMessage::Export(info_hash, sender))
    }

    // === Public Methods ===

    /// Start searching for peers of `info_hash`. Searching again for the
    /// same hash restarts the lookup and keeps the results found so far.
    ///
    /// Returns `true` if a new search was created.
    pub fn search(&self, info_hash: InfoHash) -> Result<bool, NodeWasShutdown> {
        self.request(|sender| ActorMessage::Search(info_hash, sender))
    }

    /// Restart the lookup of an existing search. Returns `false` if there is none.
    pub fn refresh(&self, info_hash: InfoHash) -> Result<bool, NodeWasShutdown> {
        self.request(|sender| ActorMessage::Refresh(info_hash, sender))
    }

    /// Forget a search. Returns `false` if there was none.
    pub fn clear(&self, info_hash: InfoHash) -> Result<bool, NodeWasShutdown> {
        self.request(|sender| ActorMessage::Clear(info_hash, sender))
    }

    /// Shutdown the actor thread loop.
    ///
    /// Returns the known nodes to persist as bootstrap nodes for the next run.
    pub fn shutdown(&self) -> Result<Vec<String>, NodeWasShutdown> {
        let nodes = self.request(ActorMessage::Shutdown)?;
        self.0.shutdown.store(true, Ordering::Release);
        debug!(nodes = nodes.len(), "Node was shutdown");

        Ok(nodes)
    }

    // === Private Methods ===

    fn request<T>(
        &self,
        message: impl FnOnce(Sender<T>) -> ActorMessage,
    ) -> Result<T, NodeWasShutdown> {
        let handle = &self.0;

        let Some(actor) = handle.sender.as_ref() else {
            return Err(NodeWasShutdown);
        };
        if handle.shutdown.load(Ordering::Acquire) {
            return Err(NodeWasShutdown);
        }

        let (sender, receiver) = flume::bounded::<T>(1);

        actor.send(message(sender)).map_err(|_| NodeWasShutdown)?;
        // The actor may be blocked in poll until its next timer.
        handle.waker.wake().map_err(|_| NodeWasShutdown)?;

        receiver.recv().map_err(|_| NodeWasShutdown)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("The node was shutdown")]
pub struct NodeWasShutdown;
