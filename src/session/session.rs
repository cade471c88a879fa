//! `MediaSession`: the coordinator that owns every task backing one active
//! call, from RTP ingress through the dialog client to RTP egress.
//!
//! One instance per peer address, wiring its RTP ingress/egress tasks,
//! buffers, and dialog client together with bounded channels.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering},
        Arc, Mutex,
    },
};

use tokio::{net::UdpSocket, sync::Notify, task::JoinHandle};
use uuid::Uuid;

use crate::{
    buffer::{jitter, output},
    codec::alaw,
    config::Config,
    constants::{
        ALAW_SILENCE_BYTE, DEFAULT_SSRC, RTP_PAYLOAD_TYPE_PCMA, SENDER_QUEUE_DEPTH,
        SESSION_INGRESS_QUEUE_DEPTH, TELEPHONY_ALAW_FRAME_BYTES,
    },
    dialog::{self, client::DialogHandle},
    dsp::vad::VadState,
    rtp::sender::{self, SenderHandle},
    session::state::SessionIdentity,
    transcript::TranscriptWriter,
};

/// One active call's worth of running tasks, reachable by peer address or
/// session id through [`crate::session::registry::SessionRegistry`].
pub struct MediaSession {
    identity: SessionIdentity,

    latched: AtomicBool,
    latched_pt: AtomicU8,
    latched_ssrc: AtomicU32,

    sender: SenderHandle,
    dialog: DialogHandle,

    ingress_tx: flume::Sender<(Vec<u8>, u8)>,
    ingress_cancel: Arc<Notify>,
    jitter_cancel: Option<Arc<Notify>>,
    output_buffer: Arc<Mutex<output::OutputBuffer>>,
    output_cancel: Arc<Notify>,

    joins: Mutex<Vec<JoinHandle<()>>>,
}

impl MediaSession {
    /// Spawns every task this session needs and returns the coordinator.
    /// The caller (the HTTP registrar or the demultiplexer) is responsible
    /// for inserting the result into the [`crate::session::registry::SessionRegistry`].
    pub fn spawn(identity: SessionIdentity, config: Arc<Config>, rtp_socket: Arc<UdpSocket>) -> Arc<Self> {
        let peer_addr = identity.peer_addr;
        let transcript = config
            .transcript_dir
            .as_ref()
            .map(|dir| TranscriptWriter::new(dir, &identity.session_id));
        let session_label = identity.session_id.simple().to_string();

        let (sender, sender_join) = sender::spawn(rtp_socket, peer_addr);

        let output_buffer = Arc::new(Mutex::new(output::OutputBuffer::new(config.output_max_chunks)));
        let (output_in_tx, output_in_rx) = flume::bounded(SESSION_INGRESS_QUEUE_DEPTH);
        let (output_framed_tx, output_framed_rx) = flume::bounded(SENDER_QUEUE_DEPTH);
        let output_cancel = Arc::new(Notify::new());
        let output_join = tokio::spawn(output::run(
            output_buffer.clone(),
            config.output_target,
            output_in_rx,
            output_framed_tx,
            output_cancel.clone(),
        ));

        let (dialog, dialog_join) = dialog::client::spawn(
            config.clone(),
            output_in_tx,
            output_buffer.clone(),
            transcript,
            session_label,
        );

        let sender_for_encode = sender.clone();
        let encode_join = tokio::spawn(async move {
            while let Ok(frame) = output_framed_rx.recv_async().await {
                match alaw::encode(&frame) {
                    Ok(encoded) => sender_for_encode.send_frame(encoded),
                    Err(e) => tracing::warn!(error = %e, "failed to a-law encode outbound frame, dropping"),
                }
            }
        });

        let mut joins = vec![sender_join, output_join, dialog_join, encode_join];

        let (jitter_in_tx, jitter_cancel) = if config.enable_jitter_buffer {
            let (tx, rx) = flume::bounded(SESSION_INGRESS_QUEUE_DEPTH);
            let (jitter_out_tx, jitter_out_rx) = flume::bounded(SESSION_INGRESS_QUEUE_DEPTH);
            let cancel = Arc::new(Notify::new());
            joins.push(tokio::spawn(jitter::run(
                config.jitter_target,
                config.jitter_max_frames,
                rx,
                jitter_out_tx,
                cancel.clone(),
            )));

            let dialog_for_forward = dialog.clone();
            joins.push(tokio::spawn(async move {
                while let Ok(frame) = jitter_out_rx.recv_async().await {
                    dialog_for_forward.push_audio(frame);
                }
            }));

            (Some(tx), Some(cancel))
        } else {
            (None, None)
        };

        let (ingress_tx, ingress_rx) = flume::bounded(SESSION_INGRESS_QUEUE_DEPTH);
        let ingress_cancel = Arc::new(Notify::new());
        joins.push(tokio::spawn(ingress_loop(
            ingress_rx,
            jitter_in_tx,
            dialog.clone(),
            config.enable_local_barge_in,
            ingress_cancel.clone(),
        )));

        Arc::new(Self {
            identity,
            latched: AtomicBool::new(false),
            latched_pt: AtomicU8::new(RTP_PAYLOAD_TYPE_PCMA),
            latched_ssrc: AtomicU32::new(DEFAULT_SSRC),
            sender,
            dialog,
            ingress_tx,
            ingress_cancel,
            jitter_cancel,
            output_buffer,
            output_cancel,
            joins: Mutex::new(joins),
        })
    }

    /// The peer address this session is routed by.
    pub fn peer_addr(&self) -> SocketAddr {
        self.identity.peer_addr
    }

    /// This session's externally visible id.
    pub fn session_id(&self) -> Uuid {
        self.identity.session_id
    }

    /// Latches transmit state from the peer's first observed RTP packet, if
    /// this is indeed the first call. Returns whether this call performed
    /// the latch (so the demultiplexer only logs/acts once per session).
    pub fn latch_if_first(&self, pt: u8, ssrc: u32, seq: u16, ts: u32) -> bool {
        if self
            .latched
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.latched_pt.store(pt, Ordering::Relaxed);
            self.latched_ssrc.store(ssrc, Ordering::Relaxed);
            self.sender.seed(pt, ssrc, seq, ts);
            true
        } else {
            false
        }
    }

    /// Hands one inbound datagram's payload to this session's ingress task.
    /// Non-blocking; drops (with a warning) if the ingress queue is full.
    pub fn push_inbound(&self, payload: Vec<u8>, pt: u8) {
        if self.ingress_tx.try_send((payload, pt)).is_err() {
            tracing::warn!(session = %self.identity.session_id, "session ingress queue full, dropping inbound packet");
        }
    }

    /// Sends one silent A-law frame immediately, used by the HTTP registrar
    /// to open the PBX's RTP expectations before any real audio exists.
    pub fn send_priming_packet(&self) {
        self.sender.seed(RTP_PAYLOAD_TYPE_PCMA, DEFAULT_SSRC, 0, 0);
        self.sender.send_frame(vec![ALAW_SILENCE_BYTE; TELEPHONY_ALAW_FRAME_BYTES]);
    }

    /// Tears the session down: stops every task in dependency order so that
    /// buffered audio is flushed rather than dropped, then waits for all of
    /// them to exit.
    pub async fn shutdown(&self) {
        self.dialog.shutdown();
        self.ingress_cancel.notify_waiters();
        if let Some(cancel) = &self.jitter_cancel {
            cancel.notify_waiters();
        }
        self.output_cancel.notify_waiters();
        self.sender.shutdown();

        let joins = {
            let mut guard = self.joins.lock().expect("session joins mutex poisoned");
            std::mem::take(&mut *guard)
        };
        for join in joins {
            let _ = join.await;
        }
    }
}

async fn ingress_loop(
    rx: flume::Receiver<(Vec<u8>, u8)>,
    jitter_in: Option<flume::Sender<Vec<u8>>>,
    dialog: DialogHandle,
    enable_local_barge_in: bool,
    cancel: Arc<Notify>,
) {
    loop {
        tokio::select! {
            _ = cancel.notified() => return,
            msg = rx.recv_async() => {
                let (payload, pt) = match msg {
                    Ok(m) => m,
                    Err(_) => return,
                };
                let pcm = if pt == RTP_PAYLOAD_TYPE_PCMA {
                    alaw::decode(&payload)
                } else if payload.len() % 2 == 0 {
                    payload
                } else {
                    tracing::warn!(pt, len = payload.len(), "dropping inbound linear pcm frame with odd byte length");
                    continue;
                };
                if enable_local_barge_in {
                    dialog.push_rms(VadState::rms(&pcm));
                }
                match &jitter_in {
                    Some(tx) => {
                        if tx.try_send(pcm).is_err() {
                            tracing::warn!("jitter buffer input queue full, dropping inbound frame");
                        }
                    }
                    None => dialog.push_audio(pcm),
                }
            }
        }
    }
}
