//! Registry of established gossip sessions.
//!
//! Catch-up only runs for peers that completed the gossip handshake; the
//! handshake itself lives elsewhere and records its result here.

use std::collections::HashMap;
use std::sync::RwLock;

use braid_core::{NodeId, RoundNumber};

/// An established gossip session with one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GossipSession {
    pub peer_id: NodeId,
    /// Last round exchanged over this session.
    pub round: RoundNumber,
}

/// Concurrent map of peer -> gossip session.
#[derive(Debug, Default)]
pub struct GossipRegistry {
    sessions: RwLock<HashMap<NodeId, GossipSession>>,
}

impl GossipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, peer_id: &NodeId) -> Option<GossipSession> {
        self.sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(peer_id).copied())
    }

    /// Record (or replace) a session.
    pub fn put(&self, peer_id: NodeId, round: RoundNumber) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(peer_id, GossipSession { peer_id, round });
        }
    }

    /// Advance the round of an existing session. Returns false if absent.
    pub fn update_round(&self, peer_id: &NodeId, round: RoundNumber) -> bool {
        match self.sessions.write() {
            Ok(mut sessions) => match sessions.get_mut(peer_id) {
                Some(session) => {
                    session.round = round;
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    pub fn remove(&self, peer_id: &NodeId) -> Option<GossipSession> {
        self.sessions
            .write()
            .ok()
            .and_then(|mut sessions| sessions.remove(peer_id))
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
