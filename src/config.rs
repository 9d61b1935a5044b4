//! Helper configuration.
//!
//! Loaded from a TOML file at startup. Every field has a default, so the
//! helper runs without a configuration file.

use crate::error::{Error, Result};
use crate::protocol::models::{
    DEFAULT_IMAGE_MODEL, DEFAULT_MODEL, DEFAULT_RESUMPTION_HANDLE, DEFAULT_VOICE, PcmFormat,
    PersonGeneration,
};
use crate::sdk::{ReconnectPolicy, SessionSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly voice assistant. Keep spoken answers short and \
conversational. Use Google Search when a question needs current information. When the user asks \
for a picture, call generate_image with a detailed image_prompt.";

/// Complete helper configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HelperConfig {
    pub session: SessionSection,
    pub capture: CaptureSection,
    pub playback: PlaybackSection,
    pub image: ImageSection,
    pub reconnect: ReconnectPolicy,
    pub logging: LoggingSection,
}

/// Live session parameters sent with every setup message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub model: String,
    /// Prebuilt voice name
    pub voice: String,
    pub system_prompt: String,
    /// Same identifier on every reconnect
    pub resumption_handle: String,
    /// Overrides the public WebSocket endpoint
    pub endpoint: Option<String>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            voice: DEFAULT_VOICE.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            resumption_handle: DEFAULT_RESUMPTION_HANDLE.into(),
            endpoint: None,
        }
    }
}

/// Recorder process. `{rate}` and `{channels}` in `args` are substituted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    pub program: String,
    pub args: Vec<String>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Bytes read from the recorder per frame
    pub read_size: usize,
}

impl Default for CaptureSection {
    fn default() -> Self {
        let format = PcmFormat::capture_default();
        Self {
            program: "arecord".into(),
            args: pcm_args(),
            sample_rate: format.sample_rate,
            channels: format.channels,
            read_size: 4096,
        }
    }
}

/// Player process. `{rate}` and `{channels}` in `args` are substituted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSection {
    pub program: String,
    pub args: Vec<String>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for PlaybackSection {
    fn default() -> Self {
        let format = PcmFormat::playback_default();
        Self {
            program: "aplay".into(),
            args: pcm_args(),
            sample_rate: format.sample_rate,
            channels: format.channels,
        }
    }
}

fn pcm_args() -> Vec<String> {
    ["-q", "-t", "raw", "-f", "S16_LE", "-c", "{channels}", "-r", "{rate}"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSection {
    pub model: String,
    pub person_generation: PersonGeneration,
    /// REST base URL
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for ImageSection {
    fn default() -> Self {
        Self {
            model: DEFAULT_IMAGE_MODEL.into(),
            person_generation: PersonGeneration::AllowAdult,
            endpoint: crate::transport::rest::BASE_URL.into(),
            timeout_secs: crate::transport::rest::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Plain,
        }
    }
}

impl HelperConfig {
    /// Load and validate the file at `path`, or `None` when it does not exist.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// describes an unusable audio format.
    #[allow(clippy::result_large_err)]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let config = match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => toml::from_str::<Self>(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        config.validate()?;
        Ok(Some(config))
    }

    /// Like [`HelperConfig::from_file`], falling back to the defaults when
    /// the file does not exist.
    ///
    /// # Errors
    /// See [`HelperConfig::from_file`].
    #[allow(clippy::result_large_err)]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_file(path)?.unwrap_or_default())
    }

    /// # Errors
    /// Returns an error if a device format or program is unusable.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        self.capture_format().validate()?;
        self.playback_format().validate()?;
        if self.capture.program.trim().is_empty() || self.playback.program.trim().is_empty() {
            return Err(Error::Config("capture and playback programs must be set".to_string()));
        }
        if self.capture.read_size == 0 {
            return Err(Error::Config("capture.read_size must be positive".to_string()));
        }
        if self.session.resumption_handle.trim().is_empty() {
            return Err(Error::Config("session.resumption_handle must be set".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub const fn capture_format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.capture.sample_rate,
            channels: self.capture.channels,
            bit_depth: 16,
        }
    }

    #[must_use]
    pub const fn playback_format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.playback.sample_rate,
            channels: self.playback.channels,
            bit_depth: 16,
        }
    }

    #[must_use]
    pub const fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image.timeout_secs)
    }

    /// Session-level settings handed to the session actor.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            model: self.session.model.clone(),
            voice: self.session.voice.clone(),
            system_prompt: self.session.system_prompt.clone(),
            resumption_handle: self.session.resumption_handle.clone(),
            capture_format: self.capture_format(),
            playback_format: self.playback_format(),
            image_model: self.image.model.clone(),
            person_generation: self.image.person_generation,
        }
    }
}
