//! Routes engine result callbacks to the matching search session.

use flume::Sender;
use tracing::{debug, trace};

use crate::common::{decode_compact_peers, COMPACT_PEER_SIZE};
use crate::engine::{EngineEvent, EventSink};
use crate::event::Event;
use crate::session::SearchRegistry;

/// [EventSink] handed to the engine for the duration of one engine call.
///
/// Callbacks for hashes without a session are dropped, they never create one.
#[derive(Debug)]
pub struct Dispatcher<'a> {
    registry: &'a mut SearchRegistry,
    events: &'a Sender<Event>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a mut SearchRegistry, events: &'a Sender<Event>) -> Self {
        Dispatcher { registry, events }
    }

    fn emit(&self, event: Event) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

impl EventSink for Dispatcher<'_> {
    fn on_event(&mut self, event: EngineEvent<'_>) {
        let info_hash = *event.info_hash();

        let Some(session) = self.registry.find_mut(&info_hash) else {
            debug!(%info_hash, "Callback executed for unknown hash");
            return;
        };

        match event {
            EngineEvent::SearchDone { .. } => {
                debug!(%info_hash, results = session.len(), "Search completed");
                session.mark_done();
                self.emit(Event::SearchDone(info_hash));
            }
            EngineEvent::Values { peers, .. } => {
                if peers.len() % COMPACT_PEER_SIZE != 0 {
                    trace!(
                        %info_hash,
                        len = peers.len(),
                        "Ignoring trailing partial peer record"
                    );
                }

                let added = session.insert_peers(decode_compact_peers(peers));
                debug!(
                    %info_hash,
                    received = peers.len() / COMPACT_PEER_SIZE,
                    added,
                    "Received values"
                );
                self.emit(Event::SearchUpdated(info_hash));
            }
            EngineEvent::Values6 { .. } => {
                debug!(%info_hash, "Receiving IPv6 peers not supported");
            }
            EngineEvent::SearchDone6 { .. } => {
                debug!(%info_hash, "IPv6 searches not supported");
            }
        }
    }
}
