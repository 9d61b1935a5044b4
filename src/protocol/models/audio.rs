use serde::{Deserialize, Serialize};

const CAPTURE_DEFAULT_RATE: u32 = 44_100;
const PLAYBACK_RATE: u32 = 24_000;
const PCM16_BITS: u16 = 16;

/// Raw signed little-endian PCM layout for a capture or playback device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl PcmFormat {
    /// Microphone capture layout (s16le mono, 44.1kHz).
    #[must_use]
    pub const fn capture_default() -> Self {
        Self {
            sample_rate: CAPTURE_DEFAULT_RATE,
            channels: 1,
            bit_depth: PCM16_BITS,
        }
    }

    /// Model speech layout (s16le mono, 24kHz).
    #[must_use]
    pub const fn playback_default() -> Self {
        Self {
            sample_rate: PLAYBACK_RATE,
            channels: 1,
            bit_depth: PCM16_BITS,
        }
    }

    /// MIME type sent alongside realtime input chunks.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }

    /// # Errors
    /// Returns an error for non-16-bit layouts, zero channels or a zero rate.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.bit_depth != PCM16_BITS {
            return Err(crate::error::Error::Config(format!(
                "pcm bit depth must be {PCM16_BITS}, got {}",
                self.bit_depth
            )));
        }
        if self.channels == 0 || self.sample_rate == 0 {
            return Err(crate::error::Error::Config(format!(
                "pcm format needs a sample rate and at least one channel ({}Hz, {}ch)",
                self.sample_rate, self.channels
            )));
        }
        Ok(())
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::capture_default()
    }
}

impl std::fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}le {}Hz {}ch", self.bit_depth, self.sample_rate, self.channels)
    }
}
