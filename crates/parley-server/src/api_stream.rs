//! Live media stream websocket.
//!
//! Each connection is driven by one task owning a [`MediaStreamSession`].
//! Events are handled strictly one at a time, so all audio for a reply is
//! queued to the connection before the next inbound event is looked at.

use crate::conversation::Conversation;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::IntoResponse,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures_util::{SinkExt, StreamExt};
use parley_types::stream::{OutboundFrame, StartMetadata, StreamEvent};
use parley_types::{session_key_or, UNKNOWN_SESSION_KEY};
use parley_voice::{StreamingSynthesizer, Transcriber};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Outbound frames buffered per connection before the session waits on the socket.
const OUTBOUND_BUFFER: usize = 64;

/// Everything a live session needs from the rest of the process.
#[derive(Clone)]
pub struct StreamServices {
    pub conversation: Conversation,
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn StreamingSynthesizer>,
    /// Longest wait for the next synthesized chunk.
    pub chunk_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingStart,
    Active,
    Closed,
}

/// Per-connection state machine: `AwaitingStart -> Active -> Closed`.
pub struct MediaStreamSession {
    services: StreamServices,
    out: mpsc::Sender<String>,
    state: SessionState,
    session_key: String,
    stream_sid: Option<String>,
    inbound: Vec<u8>,
    greeted: bool,
}

impl MediaStreamSession {
    /// `out` receives serialized outbound frames in send order.
    pub fn new(services: StreamServices, out: mpsc::Sender<String>) -> Self {
        Self {
            services,
            out,
            state: SessionState::AwaitingStart,
            session_key: UNKNOWN_SESSION_KEY.to_string(),
            stream_sid: None,
            inbound: Vec::new(),
            greeted: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn greeted(&self) -> bool {
        self.greeted
    }

    /// Bytes of caller audio accumulated since the last `stop`.
    pub fn buffered_audio(&self) -> usize {
        self.inbound.len()
    }

    /// Processes one event. `Break` means the session is over.
    pub async fn handle(&mut self, event: StreamEvent) -> ControlFlow<()> {
        if self.state == SessionState::Closed {
            return ControlFlow::Break(());
        }

        match event {
            StreamEvent::Start { start } => self.on_start(start).await,
            StreamEvent::Media { media } => self.on_media(&media.payload),
            StreamEvent::Stop => self.on_stop().await,
            StreamEvent::Close => {
                self.close();
                return ControlFlow::Break(());
            }
            StreamEvent::Unknown => {
                tracing::debug!(session_key = %self.session_key, "ignoring unknown stream event");
            }
        }
        ControlFlow::Continue(())
    }

    /// Ends the session and discards buffered audio.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            tracing::info!(session_key = %self.session_key, "media stream closed");
        }
        self.state = SessionState::Closed;
        self.inbound = Vec::new();
    }

    async fn on_start(&mut self, start: StartMetadata) {
        if self.state != SessionState::AwaitingStart {
            tracing::debug!(session_key = %self.session_key, "ignoring repeated start event");
            return;
        }

        self.session_key = session_key_or(start.caller(), UNKNOWN_SESSION_KEY);
        self.stream_sid = start.stream_sid;
        tracing::info!(session_key = %self.session_key, "media stream started");

        let greeting = self.services.conversation.greeting(&self.session_key).await;
        let frames = self.speak(&greeting).await;
        tracing::debug!(session_key = %self.session_key, frames, "greeting sent");

        self.greeted = true;
        self.state = SessionState::Active;
    }

    fn on_media(&mut self, payload: &str) {
        if self.state != SessionState::Active {
            tracing::debug!("ignoring media before start");
            return;
        }
        match STANDARD.decode(payload) {
            Ok(bytes) => self.inbound.extend_from_slice(&bytes),
            Err(e) => {
                tracing::warn!(session_key = %self.session_key, error = %e, "skipping undecodable media payload");
            }
        }
    }

    async fn on_stop(&mut self) {
        if self.state != SessionState::Active {
            tracing::debug!("ignoring stop before start");
            return;
        }

        let audio = std::mem::take(&mut self.inbound);
        let transcript = self.services.transcriber.transcribe(&audio).await;
        tracing::info!(
            session_key = %self.session_key,
            audio_bytes = audio.len(),
            transcript = %transcript,
            "caller utterance transcribed"
        );

        let reply = self
            .services
            .conversation
            .respond(&self.session_key, &transcript)
            .await;
        let frames = self.speak(&reply).await;
        tracing::debug!(session_key = %self.session_key, frames, "reply sent");
    }

    /// Streams `text` as outbound media frames. Returns the number of frames
    /// sent. A synthesis failure ends this reply early but never the session.
    async fn speak(&self, text: &str) -> usize {
        let mut audio = match self.services.synthesizer.synthesize_stream(text).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(session_key = %self.session_key, error = %e, "speech stream failed to start");
                return 0;
            }
        };

        let mut sent = 0;
        loop {
            let chunk = match tokio::time::timeout(self.services.chunk_timeout, audio.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    tracing::warn!(
                        session_key = %self.session_key,
                        frames = sent,
                        error = %e,
                        "speech stream failed, skipping rest of reply"
                    );
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        session_key = %self.session_key,
                        frames = sent,
                        "speech stream stalled, skipping rest of reply"
                    );
                    break;
                }
            };

            let frame = OutboundFrame::media(self.stream_sid.clone(), STANDARD.encode(&chunk));
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("failed to serialize outbound frame: {}", e);
                    break;
                }
            };
            if self.out.send(json).await.is_err() {
                tracing::debug!(session_key = %self.session_key, "connection gone, dropping audio");
                break;
            }
            sent += 1;
        }
        sent
    }
}

/// Handler for `GET /stream`.
pub async fn stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let services = state.stream.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, services))
}

async fn handle_socket(socket: WebSocket, services: StreamServices) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    // Forward queued frames to the socket in order.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    let mut session = MediaStreamSession::new(services, tx);

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(error = %e, "media stream transport error");
                break;
            }
        };

        let event = match msg {
            Message::Text(text) => match serde_json::from_str::<StreamEvent>(text.as_str()) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed stream frame");
                    continue;
                }
            },
            Message::Close(_) => StreamEvent::Close,
            _ => continue,
        };

        if session.handle(event).await.is_break() {
            break;
        }
    }

    session.close();
    // Dropping the session drops the last sender, letting the send task drain and exit.
    drop(session);
    if let Err(e) = send_task.await {
        tracing::debug!(error = %e, "media stream send task ended abnormally");
    }
}
