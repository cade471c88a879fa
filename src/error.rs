//! Error types, one enum per subsystem.

/// Errors from RTP packet parsing and construction.
#[derive(Debug, thiserror::Error)]
pub enum RtpError {
    /// The datagram was shorter than the fixed RTP header.
    #[error("packet too short: {0} bytes, need at least 12")]
    TooShort(usize),
    /// The RTP version field was not 2.
    #[error("unsupported RTP version: {0}")]
    UnsupportedVersion(u8),
}

/// Errors from the G.711 A-law codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// PCM16 input had an odd number of bytes.
    #[error("pcm16 buffer has odd length: {0} bytes")]
    OddLength(usize),
}

/// Errors from the dialog-model websocket client.
#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    /// The websocket handshake or connect failed.
    #[error("failed to connect to dialog model: {0}")]
    Connect(String),
    /// The underlying websocket transport returned an error mid-session.
    #[error("dialog websocket transport error: {0}")]
    Transport(String),
    /// The connection closed and reconnect attempts were exhausted or the
    /// session was torn down before reconnecting.
    #[error("dialog connection closed")]
    Closed,
}
