use crate::config::{CaptureSection, HelperConfig, PlaybackSection};
use crate::device::{InputDevice, OutputDevice, ProcessInputDevice, ProcessOutputDevice};
use crate::transport::rest::ImagenRestAdapter;
use crate::Result;

use super::events::{EventSink, UiEvents};
use super::session::{Collaborators, SessionHandle, SessionSettings};
use super::supervisor::ReconnectPolicy;
use super::tools::{ImageGenerator, ToolRegistry};
use super::transport::{Connector, WsConnector};
use std::sync::Arc;

pub struct LiveHelper;

impl LiveHelper {
    #[must_use]
    pub fn builder() -> LiveHelperBuilder {
        LiveHelperBuilder::new()
    }
}

/// Configures collaborators and spawns the session actor. Anything not set
/// falls back to the WebSocket connector, recorder/player processes and the
/// REST image client.
pub struct LiveHelperBuilder {
    settings: SessionSettings,
    connector: Option<Arc<dyn Connector>>,
    input: Option<Arc<dyn InputDevice>>,
    output: Option<Arc<dyn OutputDevice>>,
    images: Option<Arc<dyn ImageGenerator>>,
    tools: Option<ToolRegistry>,
    reconnect: ReconnectPolicy,
}

impl LiveHelperBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            settings: SessionSettings::default(),
            connector: None,
            input: None,
            output: None,
            images: None,
            tools: None,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Take settings, devices and endpoints from a loaded configuration.
    ///
    /// # Errors
    /// Returns an error if the image HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn from_config(config: &HelperConfig) -> Result<Self> {
        let images = ImagenRestAdapter::with_endpoint(config.image.endpoint.clone(), config.image_timeout())?;
        Ok(Self::new()
            .settings(config.session_settings())
            .connector(WsConnector::new(config.session.endpoint.clone()))
            .input_device(ProcessInputDevice::from_config(&config.capture))
            .output_device(ProcessOutputDevice::from_config(&config.playback))
            .image_generator(images)
            .reconnect_policy(config.reconnect.clone()))
    }

    #[must_use]
    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.settings.model = model.into();
        self
    }

    #[must_use]
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.settings.voice = voice.into();
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.settings.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn resumption_handle(mut self, handle: impl Into<String>) -> Self {
        self.settings.resumption_handle = handle.into();
        self
    }

    #[must_use]
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    #[must_use]
    pub fn input_device(mut self, device: impl InputDevice + 'static) -> Self {
        self.input = Some(Arc::new(device));
        self
    }

    #[must_use]
    pub fn output_device(mut self, device: impl OutputDevice + 'static) -> Self {
        self.output = Some(Arc::new(device));
        self
    }

    #[must_use]
    pub fn image_generator(mut self, generator: impl ImageGenerator + 'static) -> Self {
        self.images = Some(Arc::new(generator));
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    #[must_use]
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Spawn the session actor. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// Returns an error if a default collaborator cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn spawn(self) -> Result<(SessionHandle, UiEvents)> {
        let images: Arc<dyn ImageGenerator> = match self.images {
            Some(images) => images,
            None => Arc::new(ImagenRestAdapter::new()?),
        };
        let tools = match self.tools {
            Some(tools) => tools,
            None => ToolRegistry::with_defaults()?,
        };
        let collaborators = Collaborators {
            connector: self.connector.unwrap_or_else(|| Arc::new(WsConnector::default())),
            input: self
                .input
                .unwrap_or_else(|| Arc::new(ProcessInputDevice::from_config(&CaptureSection::default()))),
            output: self
                .output
                .unwrap_or_else(|| Arc::new(ProcessOutputDevice::from_config(&PlaybackSection::default()))),
            images,
            tools,
            reconnect: self.reconnect,
        };

        let (sink, events) = EventSink::channel();
        let handle = SessionHandle::spawn(self.settings, collaborators, sink);
        Ok((handle, events))
    }
}

impl Default for LiveHelperBuilder {
    fn default() -> Self {
        Self::new()
    }
}
