//! Audio device seams.
//!
//! Capture and playback are traits so the session can run against real
//! recorder/player processes or in-memory mocks.

mod process;

pub use process::{ProcessCaptureStream, ProcessInputDevice, ProcessOutputDevice, ProcessOutputHandle};

use crate::error::Result;
use crate::protocol::models::PcmFormat;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Something a capture device reported, tagged with the capture it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    pub id: u64,
    pub kind: CaptureEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEventKind {
    Frame(Vec<u8>),
    Error(String),
    /// The device is gone. Carries the exit code when there is one.
    Exited(Option<i32>),
}

/// Where a capture stream delivers its events.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    id: u64,
    tx: mpsc::UnboundedSender<CaptureEvent>,
}

impl CaptureSink {
    #[must_use]
    pub const fn new(id: u64, tx: mpsc::UnboundedSender<CaptureEvent>) -> Self {
        Self { id, tx }
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub fn frame(&self, pcm: Vec<u8>) {
        self.emit(CaptureEventKind::Frame(pcm));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(CaptureEventKind::Error(message.into()));
    }

    pub fn exited(&self, code: Option<i32>) {
        self.emit(CaptureEventKind::Exited(code));
    }

    fn emit(&self, kind: CaptureEventKind) {
        let _ = self.tx.send(CaptureEvent { id: self.id, kind });
    }
}

#[async_trait]
pub trait InputDevice: Send + Sync {
    /// Open one recording handle. Frames, errors and the final exit are
    /// delivered through `sink`.
    async fn open(&self, format: PcmFormat, sink: CaptureSink) -> Result<Box<dyn CaptureStream>>;
}

/// A live recording handle.
pub trait CaptureStream: Send {
    /// Stop delivering frames and errors. The exit notification still arrives.
    fn detach(&mut self);
    /// Ask the device to terminate and release its resources.
    fn terminate(&mut self);
}

#[async_trait]
pub trait OutputDevice: Send + Sync {
    async fn open(&self, format: PcmFormat) -> Result<Box<dyn OutputHandle>>;
}

/// A live playback handle. Writes are issued one at a time.
#[async_trait]
pub trait OutputHandle: Send {
    async fn write(&mut self, pcm: &[u8]) -> Result<()>;
    /// Signal end-of-stream so buffered audio can flush.
    async fn finish(&mut self) -> Result<()>;
    /// Resolve once the device has fully closed after `finish`.
    async fn closed(&mut self) -> Result<()>;
    /// Tear down immediately, discarding buffered audio.
    fn abort(&mut self);
}
