//! Peer table: the single source of truth for "is connected".
//!
//! # Invariants
//! - Key set == peers connected from the local point of view
//! - Exactly one liveness probe per entry, owned by the entry
//! - Removing an entry drops its probe handle, which cancels the probe;
//!   an entry is removed at most once, so a probe is cancelled at most once
//!
//! Every check-and-mutate happens under one lock, so racing establish and
//! teardown paths serialize here.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::graph::liveness::LivenessHandle;
use crate::graph::state::ConnectionState;
use crate::peer::{ConnectionId, PeerId};

/// One connected peer.
#[derive(Debug)]
pub(crate) struct PeerEntry {
    pub(crate) state: ConnectionState,
    pub(crate) epoch: ConnectionId,
    _liveness: Option<LivenessHandle>,
}

#[derive(Debug, Default)]
pub(crate) struct PeerTable {
    peers: Mutex<BTreeMap<PeerId, PeerEntry>>,
}

impl PeerTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PeerId, PeerEntry>> {
        self.peers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn contains(&self, remote: &PeerId) -> bool {
        self.lock().contains_key(remote)
    }

    pub(crate) fn state(&self, remote: &PeerId) -> Option<ConnectionState> {
        self.lock().get(remote).map(|entry| entry.state.clone())
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn connections(&self) -> Vec<PeerId> {
        self.lock().keys().cloned().collect()
    }

    pub(crate) fn states(&self) -> HashMap<PeerId, ConnectionState> {
        self.lock()
            .iter()
            .map(|(remote, entry)| (remote.clone(), entry.state.clone()))
            .collect()
    }

    /// Insert `remote` unless already present.
    ///
    /// `start_probe` runs under the table lock with the new epoch, so the
    /// entry and its probe appear together. Returns the epoch, or `None`
    /// when the peer was already connected (nothing started).
    pub(crate) fn insert(
        &self,
        remote: &PeerId,
        state: ConnectionState,
        start_probe: impl FnOnce(ConnectionId) -> Option<LivenessHandle>,
    ) -> Option<ConnectionId> {
        let mut peers = self.lock();
        if peers.contains_key(remote) {
            return None;
        }

        let epoch = ConnectionId::new();
        peers.insert(
            remote.clone(),
            PeerEntry {
                state,
                epoch,
                _liveness: start_probe(epoch),
            },
        );
        Some(epoch)
    }

    /// Remove `remote`, whatever its epoch.
    pub(crate) fn remove(&self, remote: &PeerId) -> Option<PeerEntry> {
        self.lock().remove(remote)
    }

    /// Remove `remote` only if it is still the connection identified by `epoch`.
    pub(crate) fn remove_epoch(&self, remote: &PeerId, epoch: ConnectionId) -> Option<PeerEntry> {
        let mut peers = self.lock();
        match peers.get(remote) {
            Some(entry) if entry.epoch == epoch => peers.remove(remote),
            _ => None,
        }
    }

    /// Remove every entry.
    pub(crate) fn drain(&self) -> Vec<(PeerId, PeerEntry)> {
        std::mem::take(&mut *self.lock()).into_iter().collect()
    }
}
