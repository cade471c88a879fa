//! Immutable runtime configuration, built once at startup from environment
//! variables and passed explicitly to every component.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use crate::constants::{
    DEFAULT_BARGE_IN_FRAMES_THRESHOLD,
    DEFAULT_BUFFER_MAX_FRAMES,
    DEFAULT_JITTER_TARGET_MS,
    DEFAULT_OUTPUT_TARGET_MS,
    DEFAULT_VAD_RMS_THRESHOLD,
};

/// Top-level, immutable configuration for a running bridge process.
///
/// Constructed once in `main` via [`Config::from_env`] and shared (by
/// reference-counted clone) with every task; never a global singleton.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Config {
    /// Address the RTP UDP socket binds to.
    pub rtp_listen_addr: SocketAddr,
    /// Address the HTTP control surface (registrar) binds to.
    pub http_listen_addr: SocketAddr,

    /// VAD RMS threshold in `[0, 1]`.
    pub vad_rms_threshold: f32,
    /// Consecutive high-RMS frames required to trigger barge-in.
    pub barge_in_frames_threshold: u32,
    /// Whether local barge-in detection is enabled at all.
    pub enable_local_barge_in: bool,

    /// Whether the ingress jitter buffer is enabled (disabled: frames pass
    /// straight through to the resampler).
    pub enable_jitter_buffer: bool,
    /// Ingress jitter buffer target depth.
    pub jitter_target: Duration,
    /// Ingress jitter buffer maximum depth, in frames.
    pub jitter_max_frames: usize,
    /// Egress output buffer target depth.
    pub output_target: Duration,
    /// Egress output buffer maximum depth, in chunks.
    pub output_max_chunks: usize,

    /// Dialog-model websocket URL.
    pub dialog_url: String,
    /// Bearer token used to authenticate to the dialog websocket.
    pub dialog_api_key: String,
    /// Dialog model identifier sent in `session.update`.
    pub dialog_model: String,
    /// Voice identifier sent in `session.update`.
    pub dialog_voice: String,
    /// Assistant instructions text sent in `session.update`.
    pub dialog_instructions: String,

    /// Directory to write per-call plaintext transcripts into, if any.
    pub transcript_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rtp_listen_addr: "0.0.0.0:7575".parse().expect("valid default addr"),
            http_listen_addr: "0.0.0.0:8888".parse().expect("valid default addr"),

            vad_rms_threshold: DEFAULT_VAD_RMS_THRESHOLD,
            barge_in_frames_threshold: DEFAULT_BARGE_IN_FRAMES_THRESHOLD,
            enable_local_barge_in: true,

            enable_jitter_buffer: true,
            jitter_target: Duration::from_millis(DEFAULT_JITTER_TARGET_MS),
            jitter_max_frames: DEFAULT_BUFFER_MAX_FRAMES,
            output_target: Duration::from_millis(DEFAULT_OUTPUT_TARGET_MS),
            output_max_chunks: DEFAULT_BUFFER_MAX_FRAMES,

            dialog_url: "wss://realtime.example.invalid/v1/realtime".to_owned(),
            dialog_api_key: String::new(),
            dialog_model: "realtime-preview".to_owned(),
            dialog_voice: "alloy".to_owned(),
            dialog_instructions: "You are a helpful, concise voice assistant.".to_owned(),

            transcript_dir: None,
        }
    }
}

impl Config {
    /// Builds a `Config` from the process environment, falling back to
    /// [`Config::default`] for anything unset.
    ///
    /// Recognised variables (all optional unless noted):
    /// `RTP_LISTEN_ADDR`, `HTTP_LISTEN_ADDR`, `VAD_RMS_THRESHOLD`,
    /// `BARGE_IN_FRAMES_THRESHOLD`, `ENABLE_LOCAL_BARGE_IN`,
    /// `ENABLE_JITTER_BUFFER`, `JITTER_BUFFER_TARGET_MS`,
    /// `JITTER_BUFFER_MAX_FRAMES`, `OUTPUT_BUFFER_TARGET_MS`,
    /// `OUTPUT_BUFFER_MAX_FRAMES`, `DIALOG_MODEL_URL`, `DIALOG_API_KEY`
    /// (required), `DIALOG_MODEL`, `DIALOG_VOICE`, `DIALOG_INSTRUCTIONS_FILE`,
    /// `TRANSCRIPT_LOG_DIR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(v) = env_str("RTP_LISTEN_ADDR") {
            cfg = cfg.rtp_listen_addr(parse_addr("RTP_LISTEN_ADDR", &v)?);
        }
        if let Some(v) = env_str("HTTP_LISTEN_ADDR") {
            cfg = cfg.http_listen_addr(parse_addr("HTTP_LISTEN_ADDR", &v)?);
        }
        if let Some(v) = env_f32("VAD_RMS_THRESHOLD")? {
            cfg = cfg.vad_rms_threshold(v);
        }
        if let Some(v) = env_u32("BARGE_IN_FRAMES_THRESHOLD")? {
            cfg = cfg.barge_in_frames_threshold(v);
        }
        if let Some(v) = env_bool("ENABLE_LOCAL_BARGE_IN")? {
            cfg = cfg.enable_local_barge_in(v);
        }
        if let Some(v) = env_bool("ENABLE_JITTER_BUFFER")? {
            cfg = cfg.enable_jitter_buffer(v);
        }
        if let Some(v) = env_u64("JITTER_BUFFER_TARGET_MS")? {
            cfg = cfg.jitter_target(Duration::from_millis(v));
        }
        if let Some(v) = env_usize("JITTER_BUFFER_MAX_FRAMES")? {
            cfg = cfg.jitter_max_frames(v);
        }
        if let Some(v) = env_u64("OUTPUT_BUFFER_TARGET_MS")? {
            cfg = cfg.output_target(Duration::from_millis(v));
        }
        if let Some(v) = env_usize("OUTPUT_BUFFER_MAX_FRAMES")? {
            cfg = cfg.output_max_chunks(v);
        }
        if let Some(v) = env_str("DIALOG_MODEL_URL") {
            cfg = cfg.dialog_url(v);
        }
        cfg = cfg.dialog_api_key(
            env_str("DIALOG_API_KEY").ok_or(ConfigError::MissingRequired("DIALOG_API_KEY"))?,
        );
        if let Some(v) = env_str("DIALOG_MODEL") {
            cfg = cfg.dialog_model(v);
        }
        if let Some(v) = env_str("DIALOG_VOICE") {
            cfg = cfg.dialog_voice(v);
        }
        if let Some(path) = env_str("DIALOG_INSTRUCTIONS_FILE") {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::InstructionsFile(path.clone(), e.to_string()))?;
            cfg = cfg.dialog_instructions(text.trim().to_owned());
        }
        if let Some(v) = env_str("TRANSCRIPT_LOG_DIR") {
            cfg = cfg.transcript_dir(Some(PathBuf::from(v)));
        }

        Ok(cfg)
    }

    /// Sets the RTP listener address.
    #[must_use]
    pub fn rtp_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.rtp_listen_addr = addr;
        self
    }

    /// Sets the HTTP control-surface listener address.
    #[must_use]
    pub fn http_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.http_listen_addr = addr;
        self
    }

    /// Sets the VAD RMS threshold.
    #[must_use]
    pub fn vad_rms_threshold(mut self, threshold: f32) -> Self {
        self.vad_rms_threshold = threshold;
        self
    }

    /// Sets the barge-in consecutive-frame threshold.
    #[must_use]
    pub fn barge_in_frames_threshold(mut self, frames: u32) -> Self {
        self.barge_in_frames_threshold = frames;
        self
    }

    /// Enables or disables local barge-in detection.
    #[must_use]
    pub fn enable_local_barge_in(mut self, enabled: bool) -> Self {
        self.enable_local_barge_in = enabled;
        self
    }

    /// Enables or disables the ingress jitter buffer.
    #[must_use]
    pub fn enable_jitter_buffer(mut self, enabled: bool) -> Self {
        self.enable_jitter_buffer = enabled;
        self
    }

    /// Sets the ingress jitter buffer target depth.
    #[must_use]
    pub fn jitter_target(mut self, target: Duration) -> Self {
        self.jitter_target = target;
        self
    }

    /// Sets the ingress jitter buffer maximum depth, in frames.
    #[must_use]
    pub fn jitter_max_frames(mut self, frames: usize) -> Self {
        self.jitter_max_frames = frames;
        self
    }

    /// Sets the egress output buffer target depth.
    #[must_use]
    pub fn output_target(mut self, target: Duration) -> Self {
        self.output_target = target;
        self
    }

    /// Sets the egress output buffer maximum depth, in chunks.
    #[must_use]
    pub fn output_max_chunks(mut self, chunks: usize) -> Self {
        self.output_max_chunks = chunks;
        self
    }

    /// Sets the dialog-model websocket URL.
    #[must_use]
    pub fn dialog_url(mut self, url: impl Into<String>) -> Self {
        self.dialog_url = url.into();
        self
    }

    /// Sets the dialog-model bearer token.
    #[must_use]
    pub fn dialog_api_key(mut self, key: impl Into<String>) -> Self {
        self.dialog_api_key = key.into();
        self
    }

    /// Sets the dialog model identifier.
    #[must_use]
    pub fn dialog_model(mut self, model: impl Into<String>) -> Self {
        self.dialog_model = model.into();
        self
    }

    /// Sets the dialog voice identifier.
    #[must_use]
    pub fn dialog_voice(mut self, voice: impl Into<String>) -> Self {
        self.dialog_voice = voice.into();
        self
    }

    /// Sets the assistant instructions text.
    #[must_use]
    pub fn dialog_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.dialog_instructions = instructions.into();
        self
    }

    /// Sets the transcript log directory, if transcripts should be persisted.
    #[must_use]
    pub fn transcript_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.transcript_dir = dir;
        self
    }
}

/// Errors that can occur while assembling a [`Config`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),
    /// An environment variable's value could not be parsed.
    #[error("invalid value for environment variable {0}: {1}")]
    InvalidValue(&'static str, String),
    /// The instructions file named by `DIALOG_INSTRUCTIONS_FILE` could not be read.
    #[error("failed to read instructions file {0}: {1}")]
    InstructionsFile(String, String),
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_addr(key: &'static str, v: &str) -> Result<SocketAddr, ConfigError> {
    v.parse()
        .map_err(|_| ConfigError::InvalidValue(key, v.to_owned()))
}

fn env_bool(key: &'static str) -> Result<Option<bool>, ConfigError> {
    match env_str(key) {
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue(key, v)),
        },
        None => Ok(None),
    }
}

fn env_f32(key: &'static str) -> Result<Option<f32>, ConfigError> {
    match env_str(key) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, v)),
        None => Ok(None),
    }
}

fn env_u32(key: &'static str) -> Result<Option<u32>, ConfigError> {
    match env_str(key) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, v)),
        None => Ok(None),
    }
}

fn env_u64(key: &'static str) -> Result<Option<u64>, ConfigError> {
    match env_str(key) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, v)),
        None => Ok(None),
    }
}

fn env_usize(key: &'static str) -> Result<Option<usize>, ConfigError> {
    match env_str(key) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, v)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_addrs() {
        let cfg = Config::default();
        assert_eq!(cfg.rtp_listen_addr.port(), 7575);
        assert_eq!(cfg.http_listen_addr.port(), 8888);
        assert!(cfg.enable_jitter_buffer);
        assert!(cfg.enable_local_barge_in);
    }

    #[test]
    fn builder_overrides_defaults() {
        let cfg = Config::default()
            .vad_rms_threshold(0.2)
            .barge_in_frames_threshold(5)
            .jitter_max_frames(10);
        assert_eq!(cfg.vad_rms_threshold, 0.2);
        assert_eq!(cfg.barge_in_frames_threshold, 5);
        assert_eq!(cfg.jitter_max_frames, 10);
    }
}
