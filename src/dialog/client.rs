//! The Dialog Client: owns the websocket to the Realtime dialog model,
//! drives the per-session turn-taking state machine, and reconnects with
//! capped backoff on transport failure.
//!
//! Split into two cooperating loops once connected — a send loop that
//! forwards caller audio, and a receive loop that dispatches model events
//! and owns `dialog_state`/`active_response_id`/the VAD counter — so that
//! neither direction blocks the other.

use std::sync::{Arc, Mutex};

use base64::Engine;
use futures::{stream::SplitSink, stream::SplitStream, SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::Notify};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
    MaybeTlsStream, WebSocketStream,
};

use crate::{
    buffer::output::OutputBuffer,
    config::Config,
    constants::{
        DIALOG_RECONNECT_BASE, DIALOG_RECONNECT_CAP, MIN_DIALOG_INPUT_CHUNK, MODEL_SAMPLE_RATE,
        TELEPHONY_SAMPLE_RATE,
    },
    dsp::{resample::resample, vad::VadState},
    error::DialogError,
    session::state::DialogState,
    transcript::TranscriptWriter,
};

use super::protocol::{ClientEvent, ResponseCreateBody, ServerEvent, SessionConfig};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type SharedSink = Arc<tokio::sync::Mutex<WsSink>>;

/// Handle a session holds to feed audio and VAD signals into a running
/// [`DialogClient`] and to shut it down.
#[derive(Clone)]
pub struct DialogHandle {
    audio_tx: flume::Sender<Vec<u8>>,
    vad_tx: flume::Sender<f32>,
    cancel: Arc<Notify>,
}

impl DialogHandle {
    /// Queues a jitter-buffered 8 kHz PCM16 frame to be resampled and
    /// forwarded to the model. Drops (with a warning) if the send queue is
    /// full, per the dialog PCM queue's overflow policy.
    pub fn push_audio(&self, frame: Vec<u8>) {
        if self.audio_tx.try_send(frame).is_err() {
            tracing::warn!("dialog send queue full, dropping incoming frame");
        }
    }

    /// Reports this frame's RMS for local barge-in evaluation.
    pub fn push_rms(&self, rms: f32) {
        let _ = self.vad_tx.try_send(rms);
    }

    /// Signals the dialog client's supervisor loop to stop, including any
    /// in-progress reconnect backoff.
    pub fn shutdown(&self) {
        self.cancel.notify_waiters();
    }
}

/// Spawns the dialog client's reconnect-supervising task.
///
/// Returns a [`DialogHandle`] for the owning session and the supervisor's
/// `JoinHandle`, which the session awaits during shutdown.
pub fn spawn(
    config: Arc<Config>,
    output_tx: flume::Sender<Vec<u8>>,
    output_buffer: Arc<Mutex<OutputBuffer>>,
    transcript: Option<Arc<TranscriptWriter>>,
    session_label: String,
) -> (DialogHandle, tokio::task::JoinHandle<()>) {
    let (audio_tx, audio_rx) = flume::bounded(crate::constants::DIALOG_SEND_QUEUE_DEPTH);
    let (vad_tx, vad_rx) = flume::bounded(16);
    let cancel = Arc::new(Notify::new());

    let handle = DialogHandle {
        audio_tx,
        vad_tx,
        cancel: cancel.clone(),
    };

    let join = tokio::spawn(supervise(
        config,
        audio_rx,
        vad_rx,
        output_tx,
        output_buffer,
        transcript,
        cancel,
        session_label,
    ));

    (handle, join)
}

async fn supervise(
    config: Arc<Config>,
    audio_rx: flume::Receiver<Vec<u8>>,
    vad_rx: flume::Receiver<f32>,
    output_tx: flume::Sender<Vec<u8>>,
    output_buffer: Arc<Mutex<OutputBuffer>>,
    transcript: Option<Arc<TranscriptWriter>>,
    cancel: Arc<Notify>,
    session_label: String,
) {
    let mut backoff = DIALOG_RECONNECT_BASE;

    loop {
        tokio::select! {
            _ = cancel.notified() => return,
            result = connect_and_run(
                &config,
                audio_rx.clone(),
                vad_rx.clone(),
                output_tx.clone(),
                output_buffer.clone(),
                transcript.clone(),
                cancel.clone(),
            ) => {
                match result {
                    Ok(()) => return,
                    Err(err) => {
                        tracing::warn!(session = %session_label, error = %err, backoff_ms = backoff.as_millis(), "dialog connection lost, reconnecting");
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            _ = cancel.notified() => return,
                        }
                        backoff = (backoff * 2).min(DIALOG_RECONNECT_CAP);
                    }
                }
            }
        }
    }
}

async fn connect_and_run(
    config: &Config,
    audio_rx: flume::Receiver<Vec<u8>>,
    vad_rx: flume::Receiver<f32>,
    output_tx: flume::Sender<Vec<u8>>,
    output_buffer: Arc<Mutex<OutputBuffer>>,
    transcript: Option<Arc<TranscriptWriter>>,
    cancel: Arc<Notify>,
) -> Result<(), DialogError> {
    let mut request = config
        .dialog_url
        .as_str()
        .into_client_request()
        .map_err(|e| DialogError::Connect(e.to_string()))?;
    request.headers_mut().insert(
        "Authorization",
        HeaderValue::from_str(&format!("Bearer {}", config.dialog_api_key))
            .map_err(|e| DialogError::Connect(e.to_string()))?,
    );
    request
        .headers_mut()
        .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

    let (ws_stream, _response) = connect_async(request)
        .await
        .map_err(|e| DialogError::Connect(e.to_string()))?;
    let (sink, stream) = ws_stream.split();
    let sink: SharedSink = Arc::new(tokio::sync::Mutex::new(sink));

    send_json(
        &sink,
        &ClientEvent::SessionUpdate {
            session: SessionConfig::new(
                config.dialog_model.clone(),
                config.dialog_voice.clone(),
                config.dialog_instructions.clone(),
            ),
        },
    )
    .await?;

    let send_fut = send_loop(sink.clone(), audio_rx);
    let recv_fut = recv_loop(
        stream,
        vad_rx,
        sink,
        output_tx,
        output_buffer,
        transcript,
        config.vad_rms_threshold,
        config.barge_in_frames_threshold,
    );

    tokio::select! {
        _ = cancel.notified() => Ok(()),
        res = send_fut => res,
        res = recv_fut => res,
    }
}

async fn send_json(sink: &SharedSink, event: &ClientEvent) -> Result<(), DialogError> {
    let text = serde_json::to_string(event).expect("client events always serialize");
    sink.lock()
        .await
        .send(Message::Text(text))
        .await
        .map_err(|e| DialogError::Transport(e.to_string()))
}

async fn send_loop(sink: SharedSink, audio_rx: flume::Receiver<Vec<u8>>) -> Result<(), DialogError> {
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let frame = match audio_rx.recv_async().await {
            Ok(frame) => frame,
            Err(_) => return Ok(()),
        };
        pending.extend(resample(&frame, TELEPHONY_SAMPLE_RATE, MODEL_SAMPLE_RATE));

        while pending.len() < MIN_DIALOG_INPUT_CHUNK {
            match audio_rx.try_recv() {
                Ok(extra) => pending.extend(resample(&extra, TELEPHONY_SAMPLE_RATE, MODEL_SAMPLE_RATE)),
                Err(_) => break,
            }
        }

        let batch = std::mem::take(&mut pending);
        let audio = base64::engine::general_purpose::STANDARD.encode(&batch);
        send_json(&sink, &ClientEvent::InputAudioBufferAppend { audio }).await?;
    }
}

#[allow(clippy::too_many_arguments)]
async fn recv_loop(
    mut stream: WsStream,
    vad_rx: flume::Receiver<f32>,
    sink: SharedSink,
    output_tx: flume::Sender<Vec<u8>>,
    output_buffer: Arc<Mutex<OutputBuffer>>,
    transcript: Option<Arc<TranscriptWriter>>,
    vad_threshold: f32,
    barge_in_frames: u32,
) -> Result<(), DialogError> {
    let mut state = DialogState::Idle;
    let mut active_response_id: Option<String> = None;
    let mut vad = VadState::new();
    let mut transcript_buf = String::new();

    loop {
        tokio::select! {
            frame = stream.next() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => return Err(DialogError::Transport(e.to_string())),
                    None => return Err(DialogError::Closed),
                };
                match frame {
                    Message::Text(text) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                handle_server_event(
                                    event,
                                    &sink,
                                    &mut state,
                                    &mut active_response_id,
                                    &output_tx,
                                    &output_buffer,
                                    &transcript,
                                    &mut transcript_buf,
                                ).await?;
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "malformed dialog event, dropping");
                            }
                        }
                    }
                    Message::Ping(payload) => {
                        let _ = sink.lock().await.send(Message::Pong(payload)).await;
                    }
                    Message::Close(_) => return Err(DialogError::Closed),
                    _ => {}
                }
            }
            rms = vad_rx.recv_async() => {
                let rms = match rms {
                    Ok(rms) => rms,
                    Err(_) => return Ok(()),
                };
                let is_speech = vad.observe(rms, vad_threshold);
                if is_speech && vad.should_barge_in(barge_in_frames) && state == DialogState::ModelSpeaking {
                    output_buffer.lock().expect("output buffer mutex poisoned").clear();
                    active_response_id = None;
                    state = DialogState::UserSpeaking;
                    vad.reset();
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_server_event(
    event: ServerEvent,
    sink: &SharedSink,
    state: &mut DialogState,
    active_response_id: &mut Option<String>,
    output_tx: &flume::Sender<Vec<u8>>,
    output_buffer: &Arc<Mutex<OutputBuffer>>,
    transcript: &Option<Arc<TranscriptWriter>>,
    transcript_buf: &mut String,
) -> Result<(), DialogError> {
    match event {
        ServerEvent::SessionCreated => {
            *state = DialogState::Idle;
            send_json(
                sink,
                &ClientEvent::ResponseCreate {
                    response: ResponseCreateBody {
                        modalities: vec!["audio".to_owned(), "text".to_owned()],
                    },
                },
            )
            .await?;
        }
        ServerEvent::ResponseCreated { response } => {
            let new_id = response.id;
            if active_response_id.is_some() && active_response_id.as_ref() != new_id.as_ref() {
                output_buffer.lock().expect("output buffer mutex poisoned").clear();
            }
            *active_response_id = new_id;
            *state = DialogState::ModelSpeaking;
        }
        ServerEvent::ResponseAudioDelta { response_id, delta } => {
            if response_id.is_some() && response_id != *active_response_id {
                return Ok(());
            }
            match base64::engine::general_purpose::STANDARD.decode(&delta) {
                Ok(bytes) if !bytes.is_empty() => {
                    let resampled = resample(&bytes, MODEL_SAMPLE_RATE, TELEPHONY_SAMPLE_RATE);
                    if output_tx.try_send(resampled).is_err() {
                        tracing::warn!("output buffer input queue full, dropping delta");
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "malformed response.audio.delta payload"),
            }
        }
        ServerEvent::ResponseAudioTranscriptDelta { delta } => {
            transcript_buf.push_str(&delta);
        }
        ServerEvent::ResponseAudioTranscriptDone => {
            if !transcript_buf.is_empty() {
                if let Some(writer) = transcript {
                    writer.log_bot_transcript(transcript_buf).await;
                }
                transcript_buf.clear();
            }
        }
        ServerEvent::InputAudioBufferSpeechStarted => {
            output_buffer.lock().expect("output buffer mutex poisoned").clear();
            *active_response_id = None;
            *state = DialogState::UserSpeaking;
        }
        ServerEvent::InputAudioBufferSpeechStopped => {
            *state = DialogState::AwaitingResponse;
        }
        ServerEvent::ResponseCompleted { response } => {
            if response.id == *active_response_id {
                *active_response_id = None;
            }
            *state = DialogState::Idle;
        }
        ServerEvent::ResponseCanceled { response } => {
            if response.id == *active_response_id {
                *active_response_id = None;
            }
            *state = DialogState::Idle;
        }
        ServerEvent::ResponseError { response, error } => {
            if response.id == *active_response_id {
                *active_response_id = None;
            }
            if let Some(error) = error {
                tracing::error!(message = ?error.message, "dialog model reported an error");
            }
            *state = DialogState::Idle;
        }
        ServerEvent::Other => {}
    }
    Ok(())
}
