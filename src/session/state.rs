//! Per-call state shared by the pieces of a [`crate::session::session::MediaSession`].

use std::net::SocketAddr;

use uuid::Uuid;

/// Conversation turn-taking state, driven by the dialog client's receive
/// loop (see `dialog::client`), which is the sole mutator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    /// Neither party is speaking; nothing pending.
    Idle,
    /// The caller is speaking (local or server VAD detected speech).
    UserSpeaking,
    /// The caller stopped speaking; waiting on the model to respond.
    AwaitingResponse,
    /// The model is speaking (egress audio in flight).
    ModelSpeaking,
}

/// Identity and routing information latched when a session is created,
/// immutable thereafter.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    /// Externally assigned (via `/register`) or freshly generated session id.
    pub session_id: Uuid,
    /// The peer's `(ip, port)` — the demultiplexer's routing key.
    pub peer_addr: SocketAddr,
}
