//! Fixed constants describing the telephony and dialog-model audio formats.
//!
//! The bridge deals with exactly two sample rates and one packet cadence;
//! nothing here is configurable, unlike [`crate::config::Config`].

use std::time::Duration;

/// RTP protocol version accepted from the PBX.
pub const RTP_VERSION: u8 = 2;

/// RTP payload type for G.711 A-law (PCMA), per RFC 3551.
pub const RTP_PAYLOAD_TYPE_PCMA: u8 = 8;

/// Fixed 12-byte RTP header length (no extensions, no CSRCs).
pub const RTP_HEADER_LEN: usize = 12;

/// Telephony-side sample rate (A-law / PCM16 from and to the PBX).
pub const TELEPHONY_SAMPLE_RATE: u32 = 8_000;

/// Dialog-model sample rate (PCM16 to and from the Realtime websocket).
pub const MODEL_SAMPLE_RATE: u32 = 24_000;

/// Audio frame cadence: 50 packets per second, 20 ms apart.
pub const FRAME_RATE_HZ: u32 = 50;

/// Wall-clock length of a single audio frame.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(1000 / FRAME_RATE_HZ as u64);

/// Bytes in one 20 ms PCM16 frame at [`TELEPHONY_SAMPLE_RATE`] (160 samples * 2 bytes).
pub const TELEPHONY_PCM_FRAME_BYTES: usize = 320;

/// Bytes in one 20 ms A-law frame at [`TELEPHONY_SAMPLE_RATE`] (1 byte/sample).
pub const TELEPHONY_ALAW_FRAME_BYTES: usize = 160;

/// Bytes in one 20 ms PCM16 frame at [`MODEL_SAMPLE_RATE`] (960 samples * 2 bytes).
pub const MODEL_PCM_FRAME_BYTES: usize = 960;

/// Samples advanced in `ts_out` per outbound telephony-side RTP packet.
pub const TELEPHONY_SAMPLES_PER_FRAME: u32 = 160;

/// A-law encoding of PCM zero ("digital silence"), ITU-T G.711.
pub const ALAW_SILENCE_BYTE: u8 = 0xD5;

/// Fallback outbound SSRC used when no inbound SSRC has been latched yet.
pub const DEFAULT_SSRC: u32 = 0x1234_5678;

/// Minimum PCM16 chunk length (bytes, at [`MODEL_SAMPLE_RATE`]) before the
/// dialog client will forward audio to the model; short frames are
/// coalesced with subsequently queued frames until this is reached.
///
/// ~30ms @ 24kHz = 720 samples * 2 bytes.
pub const MIN_DIALOG_INPUT_CHUNK: usize = 1_440;

/// Default RMS threshold (normalized to `[0, 1]`) above which a frame is
/// considered speech.
pub const DEFAULT_VAD_RMS_THRESHOLD: f32 = 0.08;

/// Default number of consecutive high-RMS frames required to trigger
/// barge-in while the model is speaking.
pub const DEFAULT_BARGE_IN_FRAMES_THRESHOLD: u32 = 2;

/// Default ingress jitter buffer target depth, in milliseconds.
pub const DEFAULT_JITTER_TARGET_MS: u64 = 40;

/// Default maximum depth (in frames) of either buffer before drop-oldest
/// kicks in.
pub const DEFAULT_BUFFER_MAX_FRAMES: usize = 200;

/// Default egress output buffer target depth, in milliseconds.
pub const DEFAULT_OUTPUT_TARGET_MS: u64 = 40;

/// Maximum length of a UDP datagram we will attempt to parse as RTP.
///
/// Comfortably above any legal telephony RTP packet (12 + 160 bytes) while
/// staying well under a typical Ethernet MTU.
pub const MAX_RTP_DATAGRAM: usize = 1_500;

/// Magic prefix identifying a loopback self-test datagram, which the
/// demultiplexer drops unconditionally rather than parsing as RTP.
pub const SELF_TEST_SENTINEL: &[u8] = b"VBSELFTEST";

/// Depth of the bounded queue from the jitter buffer/session ingress path
/// into the dialog client's send loop.
pub const DIALOG_SEND_QUEUE_DEPTH: usize = 200;

/// Depth of the bounded queue from the demultiplexer into a session's
/// ingress path.
pub const SESSION_INGRESS_QUEUE_DEPTH: usize = 200;

/// Depth of the bounded queue from the paced sender's producers into the
/// sender task.
pub const SENDER_QUEUE_DEPTH: usize = 200;

/// How long the paced sender waits on an empty queue before re-checking
/// socket liveness.
pub const SENDER_IDLE_CHECK: Duration = Duration::from_secs(1);

/// Base delay for dialog websocket reconnect backoff.
pub const DIALOG_RECONNECT_BASE: Duration = Duration::from_millis(500);

/// Cap for dialog websocket reconnect backoff.
pub const DIALOG_RECONNECT_CAP: Duration = Duration::from_secs(30);

/// Default HTTP timeout for calls to the call-control system.
pub const CALL_CONTROL_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
