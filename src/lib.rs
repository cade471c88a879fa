//! Realtime RTP/G.711 telephony bridge to a websocket-based dialog model.
//!
//! See `src/main.rs` for the binary entry point; this crate exposes every
//! subsystem as a library so integration tests can exercise them directly.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod constants;
pub mod control;
pub mod dialog;
pub mod dsp;
pub mod error;
pub mod rtp;
pub mod session;
pub mod transcript;
