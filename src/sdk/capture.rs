use super::events::{EventSink, UiEvent};
use crate::device::{CaptureEvent, CaptureEventKind, CaptureSink, CaptureStream, InputDevice};
use crate::protocol::models::PcmFormat;
use std::sync::Arc;
use tokio::sync::mpsc;

struct ActiveCapture {
    id: u64,
    stream: Box<dyn CaptureStream>,
}

/// Owns the single recording handle and the `recording` flag.
///
/// Every capture gets a fresh id. Events from an older id are stale and are
/// only used to confirm that a stopped recorder really went away.
pub struct CaptureDriver {
    device: Arc<dyn InputDevice>,
    format: PcmFormat,
    events: EventSink,
    capture_tx: mpsc::UnboundedSender<CaptureEvent>,
    active: Option<ActiveCapture>,
    recording: bool,
    next_id: u64,
}

impl CaptureDriver {
    #[must_use]
    pub fn new(
        device: Arc<dyn InputDevice>,
        format: PcmFormat,
        events: EventSink,
        capture_tx: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Self {
        Self {
            device,
            format,
            events,
            capture_tx,
            active: None,
            recording: false,
            next_id: 0,
        }
    }

    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording
    }

    #[must_use]
    pub const fn has_handle(&self) -> bool {
        self.active.is_some()
    }

    #[must_use]
    pub fn current_id(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Open the input device. Returns whether a new capture started.
    pub async fn start(&mut self, session_open: bool) -> bool {
        if self.recording {
            tracing::warn!("Already recording, ignoring start");
            return false;
        }
        if !session_open {
            tracing::warn!("No open session, ignoring start");
            return false;
        }
        if self.active.is_some() {
            tracing::warn!("Capture handle present while not recording, releasing it");
            self.release_active();
        }

        self.next_id += 1;
        let id = self.next_id;
        let sink = CaptureSink::new(id, self.capture_tx.clone());
        match self.device.open(self.format, sink).await {
            Ok(stream) => {
                self.active = Some(ActiveCapture { id, stream });
                self.recording = true;
                tracing::debug!(capture = id, format = %self.format, "Recording started");
                self.events.emit(UiEvent::RecordingStarted);
                true
            }
            Err(err) => {
                self.events.error(format!("Failed to start recording: {err}"));
                false
            }
        }
    }

    /// Stop recording. Idempotent; without `force` it is a no-op when not recording.
    pub fn stop(&mut self, force: bool) {
        if !self.recording && !force {
            return;
        }
        let was_recording = std::mem::replace(&mut self.recording, false);

        if self.release_active() {
            self.events.emit(UiEvent::RecordingStopped);
        } else if was_recording {
            tracing::warn!("Recording flag set without a capture handle, correcting");
            self.events.emit(UiEvent::RecordingStopped);
        }
    }

    fn release_active(&mut self) -> bool {
        let Some(mut active) = self.active.take() else {
            return false;
        };
        active.stream.detach();
        active.stream.terminate();
        tracing::debug!(capture = active.id, "Capture released");
        true
    }

    /// Classify a device event. Returns a frame that should be sent upstream.
    pub fn on_event(&mut self, event: CaptureEvent) -> Option<Vec<u8>> {
        if self.current_id() != Some(event.id) {
            if matches!(event.kind, CaptureEventKind::Exited(_)) {
                tracing::debug!(capture = event.id, "Stopped recorder exited");
            }
            return None;
        }

        match event.kind {
            CaptureEventKind::Frame(pcm) => (self.recording && !pcm.is_empty()).then_some(pcm),
            CaptureEventKind::Error(message) => {
                self.stop(true);
                self.events.error(format!("Recording error: {message}"));
                None
            }
            CaptureEventKind::Exited(code) => {
                self.active = None;
                if self.recording {
                    self.recording = false;
                    self.events.error(format!("Recorder exited unexpectedly (code {code:?})"));
                    self.events.emit(UiEvent::RecordingStopped);
                }
                None
            }
        }
    }
}
