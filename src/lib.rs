#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod device;
pub mod error;
pub mod protocol;
pub mod sdk;
pub mod transport;

pub use config::HelperConfig;
pub use error::{Error, Result};
pub use protocol::client_messages::ClientMessage;
pub use protocol::server_messages::{ContentPart, ServerFrame, ServerMessage};
pub use protocol::models::{
    Blob, Content, FunctionCall, FunctionResponse, ImageRequest, ImageResponse, Modality, PcmFormat,
    PersonGeneration, Setup, Tool,
};
pub use sdk::{
    AudioChunk, AudioQueue, CaptureDriver, Connector, EventSink, ImageGenerator, LiveHelper,
    LiveHelperBuilder, PlaybackDriver, PlaybackState, PlaybackStatus, ReconnectPolicy,
    ReconnectSupervisor, SessionHandle, SessionSettings, SessionState, SessionStatus, ToolDispatcher,
    ToolRegistry, Transport, UiCommand, UiEvent, UiEvents,
};

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use transport::ws::WsStream;

const TRACE_LOG_MAX_BYTES: usize = 1024;
const MAX_REALTIME_CHUNK_BYTES: usize = 15 * 1024 * 1024;
const TRACE_TRUNCATE_SUFFIX: &str = "... (truncated)";

/// The low-level client for the Gemini Live WebSocket API.
///
/// Thread safety: `LiveClient` is `Send` but not `Sync` because the underlying
/// WebSocket stream is not `Sync`.
#[must_use]
pub struct LiveClient {
    stream: WsStream,
    close_reason: Option<String>,
}

impl LiveClient {
    /// Connect to the Live API. `base_url` overrides the public endpoint.
    ///
    /// # Errors
    /// Returns an error if the connection fails or if the URL is invalid.
    pub async fn connect(api_key: &str, base_url: Option<&str>) -> Result<Self> {
        let stream = transport::ws::connect(api_key, base_url).await?;
        Ok(Self { stream, close_reason: None })
    }

    /// Send a client message to the server.
    ///
    /// # Errors
    /// Returns an error if validation or serialization fails or if the WebSocket send fails.
    pub async fn send(&mut self, message: ClientMessage) -> Result<()> {
        let json = encode_client_message(&message)?;
        self.stream.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Receive the next decoded server frame.
    ///
    /// Messages that fail to decode are logged and skipped. Returns `Ok(None)`
    /// once the server closes the socket.
    ///
    /// # Errors
    /// Returns an error if the WebSocket fails.
    pub async fn next_message(&mut self) -> Result<Option<ServerFrame>> {
        while let Some(msg) = self.stream.next().await {
            match msg? {
                Message::Text(text) => {
                    if let Some(frame) = decode_server_frame(text.as_bytes()) {
                        return Ok(Some(frame));
                    }
                }
                Message::Binary(data) => {
                    if let Some(frame) = decode_server_frame(&data) {
                        return Ok(Some(frame));
                    }
                }
                Message::Close(frame) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                    tracing::info!(%reason, "WebSocket connection closed by server");
                    self.close_reason = Some(reason);
                    return Ok(None);
                }
                Message::Ping(payload) => {
                    tracing::debug!("Received Ping, sending Pong");
                    self.stream.send(Message::Pong(payload)).await?;
                }
                _ => (),
            }
        }
        Ok(None)
    }

    /// Reason given by the server when it closed the socket, if any.
    #[must_use]
    pub fn close_reason(&self) -> Option<&str> {
        self.close_reason.as_deref()
    }
}

fn safe_truncate(s: &str, max_bytes: usize) -> std::borrow::Cow<'_, str> {
    if s.len() <= max_bytes {
        return std::borrow::Cow::Borrowed(s);
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    std::borrow::Cow::Owned(format!(
        "{} {} {} bytes",
        &s[..end],
        TRACE_TRUNCATE_SUFFIX,
        s.len() - end
    ))
}

#[allow(clippy::result_large_err)]
fn encode_client_message(message: &ClientMessage) -> Result<String> {
    validate_client_message(message)?;
    let json = serde_json::to_string(message)?;
    tracing::trace!(kind = message.kind(), "Sending message: {}", safe_truncate(&json, TRACE_LOG_MAX_BYTES));
    Ok(json)
}

fn decode_server_frame(bytes: &[u8]) -> Option<ServerFrame> {
    let text = String::from_utf8_lossy(bytes);
    tracing::trace!("Received message: {}", safe_truncate(&text, TRACE_LOG_MAX_BYTES));
    match serde_json::from_str::<ServerFrame>(&text) {
        Ok(frame) => Some(frame),
        Err(err) => {
            tracing::warn!(error = %err, "Skipping undecodable server message");
            None
        }
    }
}

/// Check a client message before it goes on the wire.
///
/// # Errors
/// Returns an error if a realtime chunk is not valid base64, exceeds 15MB,
/// or if the setup message is incomplete.
#[allow(clippy::result_large_err)]
pub fn validate_client_message(message: &ClientMessage) -> Result<()> {
    match message {
        ClientMessage::RealtimeInput(input) => {
            for chunk in &input.media_chunks {
                let size = estimate_base64_decoded_len(&chunk.data)?;
                if size > MAX_REALTIME_CHUNK_BYTES {
                    return Err(Error::InvalidClientMessage(format!(
                        "realtimeInput chunk exceeds 15MB ({size} bytes)",
                    )));
                }
            }
        }
        ClientMessage::Setup(setup) => {
            if setup.model.trim().is_empty() {
                return Err(Error::InvalidClientMessage("setup requires a model".to_string()));
            }
        }
        ClientMessage::ToolResponse(_) => {}
    }
    Ok(())
}

#[allow(clippy::result_large_err)]
fn estimate_base64_decoded_len(s: &str) -> Result<usize> {
    let bytes = s.as_bytes();
    if bytes.len() % 4 != 0 {
        return Err(Error::InvalidClientMessage(
            "realtimeInput invalid base64 length".to_string(),
        ));
    }

    let mut padding = 0;
    let mut seen_padding = false;
    for &b in bytes {
        if b == b'=' {
            seen_padding = true;
            padding += 1;
            continue;
        }
        if seen_padding {
            return Err(Error::InvalidClientMessage(
                "realtimeInput invalid base64 padding".to_string(),
            ));
        }
        let is_valid = matches!(b,
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/'
        );
        if !is_valid {
            return Err(Error::InvalidClientMessage(
                "realtimeInput invalid base64 character".to_string(),
            ));
        }
    }

    if padding > 2 {
        return Err(Error::InvalidClientMessage(
            "realtimeInput invalid base64 padding length".to_string(),
        ));
    }

    Ok(bytes.len() / 4 * 3 - padding)
}
