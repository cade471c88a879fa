//! RTP Demultiplexer: the single reader of the telephony UDP socket. Routes
//! each datagram to the right session by source `(ip, port)`, creating
//! sessions lazily on first contact.
//!
//! One task owns the socket, never blocks on downstream work, and hands
//! payloads off through bounded per-session queues.

use std::sync::Arc;

use tokio::net::UdpSocket;
use uuid::Uuid;

use crate::{
    config::Config,
    constants::{MAX_RTP_DATAGRAM, SELF_TEST_SENTINEL},
    rtp::packet::RtpPacket,
    session::{session::MediaSession, state::SessionIdentity, SessionRegistry},
};

/// Runs the demultiplexer until the socket errors out or the process is
/// asked to stop (by dropping the returned `JoinHandle`'s task via
/// `main`'s shutdown path).
pub async fn run(socket: Arc<UdpSocket>, registry: Arc<SessionRegistry>, config: Arc<Config>) {
    let mut buf = [0u8; MAX_RTP_DATAGRAM];

    loop {
        let (len, peer_addr) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "rtp socket recv failed, demultiplexer stopping");
                return;
            }
        };
        let datagram = &buf[..len];

        if datagram.starts_with(SELF_TEST_SENTINEL) {
            continue;
        }

        let parsed = match RtpPacket::parse(datagram) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(peer = %peer_addr, error = %e, "dropping unparseable datagram");
                continue;
            }
        };

        let session = match registry.get(peer_addr) {
            Some(session) => session,
            None => {
                let session_id = registry.take_pending(peer_addr).unwrap_or_else(Uuid::new_v4);
                let identity = SessionIdentity {
                    session_id,
                    peer_addr,
                };
                let session = MediaSession::spawn(identity, config.clone(), socket.clone());
                registry.insert(session.clone());
                tracing::info!(session = %session_id, peer = %peer_addr, "created session from first rtp packet");
                session
            }
        };

        let pt = parsed.payload_type;
        if session.latch_if_first(pt, parsed.ssrc, parsed.sequence, parsed.timestamp) {
            tracing::info!(session = %session.session_id(), pt, ssrc = parsed.ssrc, "latched inbound rtp state");
        }

        session.push_inbound(parsed.payload.to_vec(), pt);
    }
}
