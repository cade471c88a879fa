//! Wire types for the subset of the Realtime dialog-model websocket
//! protocol this bridge speaks: server-VAD turn taking, PCM16 audio
//! frames, and transcript deltas.

use serde::{Deserialize, Serialize};

/// Turn-detection configuration sent in `session.update`.
///
/// Fixed to server-side VAD; this bridge never drives turn boundaries
/// itself.
#[derive(Debug, Clone, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            kind: "server_vad",
            threshold: 0.5,
            prefix_padding_ms: 500,
            silence_duration_ms: 800,
        }
    }
}

/// Session configuration body of `session.update`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    pub model: String,
    pub instructions: String,
    pub modalities: Vec<String>,
    pub voice: String,
    pub input_audio_format: &'static str,
    pub output_audio_format: &'static str,
    pub turn_detection: TurnDetection,
}

impl SessionConfig {
    /// Builds the session config this bridge always sends: PCM16 in both
    /// directions, server VAD, the model/voice/instructions from config.
    pub fn new(model: impl Into<String>, voice: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            instructions: instructions.into(),
            modalities: vec!["audio".to_owned(), "text".to_owned()],
            voice: voice.into(),
            input_audio_format: "pcm16",
            output_audio_format: "pcm16",
            turn_detection: TurnDetection::default(),
        }
    }
}

/// Body of the one-shot greeting `response.create`.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseCreateBody {
    pub modalities: Vec<String>,
}

/// Events this bridge sends to the dialog model.
///
/// Server-VAD mode: this bridge never sends `input_audio_buffer.commit` or
/// a turn-driven `response.create` — only the one-time greeting create at
/// connect. Sending either of those for a voice turn would be the
/// deprecated client-VAD path and is a bug.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseCreateBody },
}

/// A `{"id": "..."}` reference to a response object, as nested under
/// `response.created` / `.completed` / `.canceled` / `.error`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseRef {
    #[serde(default)]
    pub id: Option<String>,
}

/// Events received from the dialog model that this bridge's state machine
/// reacts to. Event kinds this bridge has no use for (e.g. text-only
/// transcript deltas of the caller's own speech) are parsed into `Other`
/// and ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated,
    #[serde(rename = "response.created")]
    ResponseCreated {
        #[serde(default)]
        response: ResponseRef,
    },
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        delta: String,
    },
    #[serde(rename = "response.audio_transcript.delta")]
    ResponseAudioTranscriptDelta {
        #[serde(default)]
        delta: String,
    },
    #[serde(rename = "response.audio_transcript.done")]
    ResponseAudioTranscriptDone,
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted,
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    InputAudioBufferSpeechStopped,
    #[serde(rename = "response.completed")]
    ResponseCompleted {
        #[serde(default)]
        response: ResponseRef,
    },
    #[serde(rename = "response.canceled")]
    ResponseCanceled {
        #[serde(default)]
        response: ResponseRef,
    },
    #[serde(rename = "response.error")]
    ResponseError {
        #[serde(default)]
        response: ResponseRef,
        #[serde(default)]
        error: Option<ErrorBody>,
    },
    #[serde(other)]
    Other,
}

/// Error detail nested under `response.error`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_update_serializes_with_dotted_type() {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig::new("realtime-preview", "alloy", "be helpful"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"session.update\""));
        assert!(json.contains("\"turn_detection\""));
        assert!(json.contains("\"server_vad\""));
    }

    #[test]
    fn response_audio_delta_round_trips_response_id() {
        let json = r#"{"type":"response.audio.delta","response_id":"resp_1","delta":"QUJD"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::ResponseAudioDelta { response_id, delta } => {
                assert_eq!(response_id.as_deref(), Some("resp_1"));
                assert_eq!(delta, "QUJD");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn response_created_extracts_nested_id() {
        let json = r#"{"type":"response.created","response":{"id":"resp_2"}}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::ResponseCreated { response } => {
                assert_eq!(response.id.as_deref(), Some("resp_2"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_type_falls_back_to_other() {
        let json = r#"{"type":"conversation.item.input_audio_transcription.delta","delta":"hi"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ServerEvent::Other));
    }
}
