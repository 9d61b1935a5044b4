use crate::Result;
use crate::protocol::models::Blob;
use base64::Engine as _;
use base64::engine::general_purpose;
use std::collections::VecDeque;

/// One chunk of model speech, still base64 encoded as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    blob: Blob,
}

impl AudioChunk {
    #[must_use]
    pub const fn new(blob: Blob) -> Self {
        Self { blob }
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.blob.mime_type
    }

    #[must_use]
    pub fn encoded(&self) -> &str {
        &self.blob.data
    }

    /// Decode the payload into raw PCM bytes.
    ///
    /// # Errors
    /// Returns an error if the payload is not valid base64.
    #[allow(clippy::result_large_err)]
    pub fn decode(&self) -> Result<Vec<u8>> {
        Ok(general_purpose::STANDARD.decode(self.blob.data.as_bytes())?)
    }
}

impl From<Blob> for AudioChunk {
    fn from(blob: Blob) -> Self {
        Self::new(blob)
    }
}

/// FIFO of chunks awaiting playback. Never reordered; cleared wholesale.
#[derive(Debug, Default)]
pub struct AudioQueue {
    chunks: VecDeque<AudioChunk>,
}

impl AudioQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: AudioChunk) {
        self.chunks.push_back(chunk);
    }

    pub fn pop(&mut self) -> Option<AudioChunk> {
        self.chunks.pop_front()
    }

    /// Drop everything, returning how many chunks were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.chunks.len();
        self.chunks.clear();
        dropped
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
