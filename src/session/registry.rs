//! `SessionRegistry`: the `peer_addr -> session` map, plus the
//! pre-registration map consulted on first RTP arrival.
//!
//! Concurrent mutation from the demultiplexer (on RX), the HTTP registrar,
//! and session cleanup is the reason for `DashMap` over a plain
//! mutex-guarded `HashMap`.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::session::session::MediaSession;

/// Shared, concurrency-safe map from peer address to running session, plus
/// the pre-registration bookkeeping the HTTP registrar needs.
#[derive(Default)]
pub struct SessionRegistry {
    by_peer: DashMap<SocketAddr, Arc<MediaSession>>,
    by_id: DashMap<Uuid, SocketAddr>,
    pending: DashMap<SocketAddr, Uuid>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the session currently bound to `peer_addr`, if any.
    pub fn get(&self, peer_addr: SocketAddr) -> Option<Arc<MediaSession>> {
        self.by_peer.get(&peer_addr).map(|entry| entry.clone())
    }

    /// Consumes and returns any pre-registered session id for `peer_addr`,
    /// if present. Called once by the demultiplexer when a session must be
    /// created lazily on first RTP.
    pub fn take_pending(&self, peer_addr: SocketAddr) -> Option<Uuid> {
        self.pending.remove(&peer_addr).map(|(_, id)| id)
    }

    /// Registers a freshly created session under its peer address and id.
    pub fn insert(&self, session: Arc<MediaSession>) {
        let peer_addr = session.peer_addr();
        let session_id = session.session_id();
        self.by_peer.insert(peer_addr, session);
        self.by_id.insert(session_id, peer_addr);
    }

    /// Records a pre-registration: the peer at `peer_addr` is expected to
    /// identify as `session_id` once RTP arrives. Idempotent — a second
    /// pre-registration for the same peer simply overwrites the id.
    pub fn pre_register(&self, peer_addr: SocketAddr, session_id: Uuid) {
        self.pending.insert(peer_addr, session_id);
    }

    /// Removes the session identified by `session_id`, returning it so the
    /// caller can drive its shutdown. Returns `None` if no such session (or
    /// pending registration) exists.
    pub fn remove_by_id(&self, session_id: Uuid) -> Option<Arc<MediaSession>> {
        if let Some((_, peer_addr)) = self.by_id.remove(&session_id) {
            self.pending.remove(&peer_addr);
            return self.by_peer.remove(&peer_addr).map(|(_, session)| session);
        }
        // No active session yet, but a pre-registration might still be
        // pending; clear it so a late-arriving packet doesn't resurrect it.
        let pending_addr = self
            .pending
            .iter()
            .find(|entry| *entry.value() == session_id)
            .map(|entry| *entry.key());
        if let Some(addr) = pending_addr {
            self.pending.remove(&addr);
        }
        None
    }

    /// Removes the session bound to `peer_addr`, e.g. on unrecoverable
    /// websocket error or call-control hangup.
    pub fn remove_by_peer(&self, peer_addr: SocketAddr) -> Option<Arc<MediaSession>> {
        if let Some((_, session)) = self.by_peer.remove(&peer_addr) {
            self.by_id.remove(&session.session_id());
            Some(session)
        } else {
            None
        }
    }

    /// Number of currently active sessions.
    pub fn active_count(&self) -> usize {
        self.by_peer.len()
    }

    /// Removes and returns every currently active session, e.g. for
    /// process-shutdown draining.
    pub fn drain(&self) -> Vec<Arc<MediaSession>> {
        let sessions: Vec<Arc<MediaSession>> = self
            .by_peer
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.by_peer.clear();
        self.by_id.clear();
        self.pending.clear();
        sessions
    }

    /// Re-points the id lookup for an already-running session at
    /// `peer_addr` to `new_session_id`, implementing `/register`'s
    /// idempotent "second registration updates the id" rule. Returns
    /// `false` if no session is running for that peer yet.
    pub fn rebind_peer(&self, peer_addr: SocketAddr, new_session_id: Uuid) -> bool {
        match self.by_peer.get(&peer_addr) {
            Some(session) => {
                self.by_id.remove(&session.session_id());
                self.by_id.insert(new_session_id, peer_addr);
                true
            }
            None => false,
        }
    }
}
