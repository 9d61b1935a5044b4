use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Notifications for the front-end. Serialized with a `type` tag, e.g.
/// `{"type":"HELPER_ERROR","error":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiEvent {
    Initializing,
    HelperReady,
    HelperError { error: String },
    RecordingStarted,
    RecordingStopped,
    GeminiTextResponse { text: String },
    GeminiTurnComplete,
    GeminiImageGenerating,
    /// Base64 encoded image bytes.
    GeminiImageGenerated { image: String },
    GeminiImageBlocked { reason: String },
}

impl UiEvent {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::HelperError { error: message.into() }
    }
}

/// Requests from the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiCommand {
    StartConnection {
        #[serde(rename = "apiKey", default)]
        api_key: Option<String>,
    },
    StartContinuousRecording,
    StopRecording,
}

/// Sending side of the UI event channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl EventSink {
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self { tx }
    }

    #[must_use]
    pub fn channel() -> (Self, UiEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), UiEvents::new(rx))
    }

    pub fn emit(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("UI event dropped, receiver gone");
        }
    }

    /// Log and surface an error.
    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(error = %message, "Reporting error to UI");
        self.emit(UiEvent::error(message));
    }
}

/// Receiving side of the UI event channel.
#[derive(Debug)]
pub struct UiEvents {
    rx: mpsc::UnboundedReceiver<UiEvent>,
}

impl UiEvents {
    #[must_use]
    pub const fn new(rx: mpsc::UnboundedReceiver<UiEvent>) -> Self {
        Self { rx }
    }

    pub async fn recv(&mut self) -> Option<UiEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<UiEvent> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now.
    pub fn drain(&mut self) -> Vec<UiEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

impl Stream for UiEvents {
    type Item = UiEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll_recv(cx)
    }
}
