//! Identity to connection registry.

use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use guessink_core::ParticipantId;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Outbound side of one live connection.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    /// Distinguishes connections that announced the same identity.
    pub conn_id: Uuid,
    /// Drained by the connection's own task.
    pub tx: mpsc::UnboundedSender<Utf8Bytes>,
}

impl PeerHandle {
    pub fn new(tx: mpsc::UnboundedSender<Utf8Bytes>) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            tx,
        }
    }
}

/// Live connections keyed by participant identity. At most one entry per
/// identity.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    peers: DashMap<ParticipantId, PeerHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id`, replacing any previous connection. Returns true if an
    /// entry was replaced.
    pub fn register(&self, id: ParticipantId, handle: PeerHandle) -> bool {
        self.peers.insert(id, handle).is_some()
    }

    /// Remove `id` only if it is still registered to `conn_id`.
    pub fn unregister(&self, id: &ParticipantId, conn_id: Uuid) -> bool {
        self.peers
            .remove_if(id, |_, handle| handle.conn_id == conn_id)
            .is_some()
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.peers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Forward to one participant. Returns the number of deliveries (0 or 1).
    pub fn send_to(&self, id: &ParticipantId, payload: Utf8Bytes) -> usize {
        // Clone out of the map so no shard lock is held while sending.
        let Some(handle) = self.peers.get(id).map(|entry| entry.value().clone()) else {
            return 0;
        };
        if handle.tx.send(payload).is_ok() {
            1
        } else {
            self.prune(id, handle.conn_id);
            0
        }
    }

    /// Forward to every registered participant except `except`. Returns the
    /// number of deliveries.
    pub fn broadcast(&self, except: Option<&ParticipantId>, payload: Utf8Bytes) -> usize {
        let recipients: Vec<(ParticipantId, PeerHandle)> = self
            .peers
            .iter()
            .filter(|entry| Some(entry.key()) != except)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        for (id, handle) in recipients {
            if handle.tx.send(payload.clone()).is_ok() {
                delivered += 1;
            } else {
                self.prune(&id, handle.conn_id);
            }
        }
        delivered
    }

    fn prune(&self, id: &ParticipantId, conn_id: Uuid) {
        if self.unregister(id, conn_id) {
            debug!("Pruned unreachable connection for {}", id);
        }
    }
}
