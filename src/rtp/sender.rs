//! RTP Paced Sender: the single serialized owner of one session's transmit
//! state (`seq_out`/`ts_out`/`ssrc_out`/payload type), pacing emission to
//! exactly 20 ms/packet.

use std::{net::SocketAddr, sync::Arc};

use tokio::{net::UdpSocket, sync::Notify, time::Instant};

use crate::{
    constants::{
        DEFAULT_SSRC, FRAME_INTERVAL, RTP_PAYLOAD_TYPE_PCMA, SENDER_IDLE_CHECK,
        TELEPHONY_ALAW_FRAME_BYTES, TELEPHONY_SAMPLES_PER_FRAME,
    },
    rtp::packet::RtpPacket,
};

/// Commands accepted by the paced sender's queue.
pub enum SenderCommand {
    /// Latches transmit state from a peer's first observed RTP packet.
    /// Sent at most once per session, before any `Frame` commands.
    Seed {
        pt: u8,
        ssrc: u32,
        seq: u16,
        ts: u32,
    },
    /// One 160-byte A-law frame to emit as RTP.
    Frame(Vec<u8>),
}

/// Handle a session holds to drive its paced sender task.
#[derive(Clone)]
pub struct SenderHandle {
    tx: flume::Sender<SenderCommand>,
    cancel: Arc<Notify>,
}

impl SenderHandle {
    /// Latches the transmit state observed on the peer's first packet.
    pub fn seed(&self, pt: u8, ssrc: u32, seq: u16, ts: u32) {
        if self
            .tx
            .try_send(SenderCommand::Seed { pt, ssrc, seq, ts })
            .is_err()
        {
            tracing::warn!("sender queue full, dropping seed command");
        }
    }

    /// Queues a 160-byte A-law frame for transmission.
    pub fn send_frame(&self, frame: Vec<u8>) {
        if self.tx.try_send(SenderCommand::Frame(frame)).is_err() {
            tracing::warn!("sender queue full, dropping outbound frame");
        }
    }

    /// Signals the sender task to stop. The sender does not flush on
    /// cancellation; queued frames are simply discarded.
    pub fn shutdown(&self) {
        self.cancel.notify_waiters();
    }
}

/// Spawns the paced sender task for one session.
///
/// `socket` is the shared RTP UDP socket; writes to it are independent
/// datagrams and require no additional locking.
pub fn spawn(socket: Arc<UdpSocket>, peer_addr: SocketAddr) -> (SenderHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = flume::bounded(crate::constants::SENDER_QUEUE_DEPTH);
    let cancel = Arc::new(Notify::new());
    let handle = SenderHandle {
        tx,
        cancel: cancel.clone(),
    };
    let join = tokio::spawn(run(socket, peer_addr, rx, cancel));
    (handle, join)
}

async fn run(
    socket: Arc<UdpSocket>,
    peer_addr: SocketAddr,
    rx: flume::Receiver<SenderCommand>,
    cancel: Arc<Notify>,
) {
    let mut pt = RTP_PAYLOAD_TYPE_PCMA;
    let mut ssrc = DEFAULT_SSRC;
    let mut seq: u16 = 0;
    let mut ts: u32 = 0;
    let mut last_send = Instant::now();

    loop {
        tokio::select! {
            _ = cancel.notified() => return,
            cmd = rx.recv_async() => {
                match cmd {
                    Ok(SenderCommand::Seed { pt: p, ssrc: s, seq: sq, ts: t }) => {
                        pt = p;
                        ssrc = s;
                        seq = sq;
                        ts = t;
                    }
                    Ok(SenderCommand::Frame(payload)) => {
                        if payload.len() != TELEPHONY_ALAW_FRAME_BYTES {
                            tracing::warn!(len = payload.len(), "outbound a-law frame has unexpected size, sending anyway");
                        }
                        seq = seq.wrapping_add(1);
                        ts = ts.wrapping_add(TELEPHONY_SAMPLES_PER_FRAME);
                        let datagram = RtpPacket::build(seq, ts, ssrc, pt, &payload);
                        if let Err(e) = socket.send_to(&datagram, peer_addr).await {
                            tracing::warn!(error = %e, peer = %peer_addr, "failed to send rtp datagram");
                        }

                        let elapsed = last_send.elapsed();
                        last_send = Instant::now();
                        if elapsed < FRAME_INTERVAL {
                            tokio::time::sleep(FRAME_INTERVAL - elapsed).await;
                        }
                    }
                    Err(_) => return,
                }
            }
            _ = tokio::time::sleep(SENDER_IDLE_CHECK) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UdpSocket as TokioUdpSocket;

    #[tokio::test]
    async fn emits_sequential_seq_and_timestamp() {
        let server = TokioUdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = Arc::new(TokioUdpSocket::bind("127.0.0.1:0").await.unwrap());

        let (handle, join) = spawn(client, server_addr);
        handle.seed(8, 0xAAAA, 65530, 0);
        for _ in 0..10 {
            handle.send_frame(vec![0xD5; 160]);
        }

        let mut seqs = Vec::new();
        let mut buf = [0u8; 1500];
        for _ in 0..10 {
            let (n, _) = server.recv_from(&mut buf).await.unwrap();
            let parsed = RtpPacket::parse(&buf[..n]).unwrap();
            seqs.push(parsed.sequence);
        }
        assert_eq!(seqs, vec![65531, 65532, 65533, 65534, 65535, 0, 1, 2, 3, 4]);

        handle.shutdown();
        let _ = join.await;
    }
}
