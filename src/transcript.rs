//! Optional per-call plaintext transcript logging.
//!
//! Best-effort and non-blocking to the hot audio path: failures to open or
//! write the log are logged and otherwise ignored, never propagated.

use std::{path::PathBuf, sync::Arc};

use chrono::Local;
use tokio::{
    fs::OpenOptions,
    io::AsyncWriteExt,
    sync::Mutex,
};

/// Writes timestamped user/bot transcript lines to a per-call log file.
///
/// One instance per session. The underlying file is opened lazily on first
/// write.
pub struct TranscriptWriter {
    path: PathBuf,
    file: Mutex<Option<tokio::fs::File>>,
}

impl TranscriptWriter {
    /// Builds the writer for a call starting now, naming the file
    /// `call_<YYYYMMDD_HHMMSS>_<uuid8>.txt` under `dir`.
    pub fn new(dir: &std::path::Path, session_uuid: &uuid::Uuid) -> Arc<Self> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let short_id = &session_uuid.simple().to_string()[..8];
        let path = dir.join(format!("call_{stamp}_{short_id}.txt"));
        Arc::new(Self {
            path,
            file: Mutex::new(None),
        })
    }

    async fn ensure_open(&self) -> std::io::Result<()> {
        let mut guard = self.file.lock().await;
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            *guard = Some(file);
        }
        Ok(())
    }

    async fn append_line(&self, label: &str, text: &str) {
        if let Err(e) = self.ensure_open().await {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to open transcript log");
            return;
        }
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let line = format!("[{timestamp}] {label}: {text}\n");
        let mut guard = self.file.lock().await;
        if let Some(file) = guard.as_mut() {
            if let Err(e) = file.write_all(line.as_bytes()).await {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to write transcript line");
            }
        }
    }

    /// Appends a caller-transcript line. Not currently driven by the
    /// dialog client (the event subset in use has no caller-speech
    /// transcription event), kept for symmetry and future use.
    pub async fn log_user_transcript(&self, text: &str) {
        self.append_line("caller", text).await;
    }

    /// Appends a bot-transcript line, called on `response.audio_transcript.done`.
    pub async fn log_bot_transcript(&self, text: &str) {
        self.append_line("bot", text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_bot_transcript_line_to_file() {
        let dir = std::env::temp_dir().join(format!("voicebridge-transcript-test-{}", uuid::Uuid::new_v4()));
        let session_uuid = uuid::Uuid::new_v4();
        let writer = TranscriptWriter::new(&dir, &session_uuid);
        writer.log_bot_transcript("hello there").await;

        let entries = std::fs::read_dir(&dir).expect("dir created");
        let mut found = false;
        for entry in entries.flatten() {
            let contents = std::fs::read_to_string(entry.path()).unwrap();
            if contents.contains("bot: hello there") {
                found = true;
            }
        }
        assert!(found, "expected transcript file containing the bot line");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
