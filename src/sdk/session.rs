use super::capture::CaptureDriver;
use super::connection::{ConnectionEvent, ConnectionHandle, ConnectionNotice};
use super::events::{EventSink, UiCommand, UiEvent};
use super::playback::{PlaybackDriver, PlaybackStatus};
use super::router::ResponseRouter;
use super::supervisor::{ReconnectPolicy, ReconnectSupervisor};
use super::tools::{ImageGenerator, ToolDispatcher, ToolRegistry};
use super::transport::{Connector, Transport};
use crate::device::{CaptureEvent, InputDevice, OutputDevice};
use crate::protocol::client_messages::ClientMessage;
use crate::protocol::models::{
    Content, DEFAULT_IMAGE_MODEL, DEFAULT_MODEL, DEFAULT_RESUMPTION_HANDLE, DEFAULT_VOICE,
    GenerationConfig, Modality, PcmFormat, PersonGeneration, SessionResumptionConfig, Setup,
    SpeechConfig,
};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

const REQUEST_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Initializing,
    Open,
    Closing,
    Erroring,
}

/// Everything that shapes a session apart from its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub model: String,
    pub voice: String,
    pub system_prompt: String,
    pub resumption_handle: String,
    pub capture_format: PcmFormat,
    pub playback_format: PcmFormat,
    pub image_model: String,
    pub person_generation: PersonGeneration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            system_prompt: crate::config::DEFAULT_SYSTEM_PROMPT.to_string(),
            resumption_handle: DEFAULT_RESUMPTION_HANDLE.to_string(),
            capture_format: PcmFormat::capture_default(),
            playback_format: PcmFormat::playback_default(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            person_generation: PersonGeneration::AllowAdult,
        }
    }
}

impl SessionSettings {
    /// The setup message sent on every connect, reconnects included.
    #[must_use]
    pub fn setup(&self, tools: &ToolRegistry) -> Setup {
        Setup {
            model: self.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: vec![Modality::Audio],
                speech_config: Some(SpeechConfig::prebuilt(self.voice.clone())),
            },
            system_instruction: Some(Content::from_text(self.system_prompt.clone())),
            tools: tools.as_tools(),
            session_resumption: Some(SessionResumptionConfig {
                handle: Some(self.resumption_handle.clone()),
                transparent: true,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub connection_open: bool,
    pub recording: bool,
    pub capture_handle: bool,
    pub playback: PlaybackStatus,
    pub generation: u64,
    pub reconnect_attempts: u32,
}

pub(crate) struct Collaborators {
    pub connector: Arc<dyn Connector>,
    pub input: Arc<dyn InputDevice>,
    pub output: Arc<dyn OutputDevice>,
    pub images: Arc<dyn ImageGenerator>,
    pub tools: ToolRegistry,
    pub reconnect: ReconnectPolicy,
}

enum Request {
    Command(UiCommand),
    Status(oneshot::Sender<SessionStatus>),
    Shutdown(oneshot::Sender<()>),
}

enum Internal {
    Opened {
        generation: u64,
        transport: Box<dyn Transport>,
    },
    ConnectFailed {
        generation: u64,
        error: Error,
    },
    ReconnectDue {
        generation: u64,
    },
}

/// Handle to the session actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<Request>,
}

impl SessionHandle {
    /// Spawn the session actor and return its handle.
    pub(crate) fn spawn(settings: SessionSettings, collaborators: Collaborators, events: EventSink) -> Self {
        let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        let (capture_tx, capture_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let playback = PlaybackDriver::spawn(
            Arc::clone(&collaborators.output),
            settings.playback_format,
            events.clone(),
        );
        let capture = CaptureDriver::new(
            Arc::clone(&collaborators.input),
            settings.capture_format,
            events.clone(),
            capture_tx,
        );

        let ctx = SessionContext {
            supervisor: ReconnectSupervisor::new(collaborators.reconnect.clone()),
            settings,
            connector: collaborators.connector,
            images: collaborators.images,
            tools: collaborators.tools,
            events,
            state: SessionState::Idle,
            connection_open: false,
            api_key: None,
            generation: 0,
            connection: None,
            router: None,
            capture,
            playback,
            conn_tx,
            internal_tx,
        };
        tokio::spawn(ctx.run(rx, conn_rx, capture_rx, internal_rx));

        Self { sender: tx }
    }

    /// Apply a front-end command.
    ///
    /// # Errors
    /// Returns an error if the session actor has stopped.
    pub async fn handle_command(&self, command: UiCommand) -> Result<()> {
        self.sender
            .send(Request::Command(command))
            .await
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Start a session with `api_key`. A no-op when one is already starting or open.
    ///
    /// # Errors
    /// Returns an error if the session actor has stopped.
    pub async fn initialize(&self, api_key: impl Into<String>) -> Result<()> {
        self.handle_command(UiCommand::StartConnection {
            api_key: Some(api_key.into()),
        })
        .await
    }

    /// # Errors
    /// Returns an error if the session actor has stopped.
    pub async fn start_recording(&self) -> Result<()> {
        self.handle_command(UiCommand::StartContinuousRecording).await
    }

    /// # Errors
    /// Returns an error if the session actor has stopped.
    pub async fn stop_recording(&self) -> Result<()> {
        self.handle_command(UiCommand::StopRecording).await
    }

    /// Snapshot of the session after every previously sent command was applied.
    ///
    /// # Errors
    /// Returns an error if the session actor has stopped.
    pub async fn status(&self) -> Result<SessionStatus> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Request::Status(tx))
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)
    }

    /// Tear everything down and stop the actor.
    ///
    /// # Errors
    /// Returns an error if the session actor had already stopped.
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Request::Shutdown(tx))
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)
    }
}

/// All session state, owned by the actor task.
struct SessionContext {
    settings: SessionSettings,
    connector: Arc<dyn Connector>,
    images: Arc<dyn ImageGenerator>,
    tools: ToolRegistry,
    events: EventSink,
    state: SessionState,
    connection_open: bool,
    api_key: Option<Arc<str>>,
    generation: u64,
    connection: Option<ConnectionHandle>,
    router: Option<ResponseRouter>,
    capture: CaptureDriver,
    playback: PlaybackDriver,
    supervisor: ReconnectSupervisor,
    conn_tx: mpsc::UnboundedSender<ConnectionNotice>,
    internal_tx: mpsc::UnboundedSender<Internal>,
}

impl SessionContext {
    async fn run(
        mut self,
        mut requests: mpsc::Receiver<Request>,
        mut conn_rx: mpsc::UnboundedReceiver<ConnectionNotice>,
        mut capture_rx: mpsc::UnboundedReceiver<CaptureEvent>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            tokio::select! {
                req = requests.recv() => {
                    match req {
                        Some(Request::Command(command)) => self.handle_command(command).await,
                        Some(Request::Status(respond)) => {
                            let _ = respond.send(self.status());
                        }
                        Some(Request::Shutdown(respond)) => {
                            self.shutdown();
                            let _ = respond.send(());
                            break;
                        }
                        None => {
                            self.shutdown();
                            break;
                        }
                    }
                }
                Some(notice) = conn_rx.recv() => self.on_connection(notice),
                Some(event) = capture_rx.recv() => self.on_capture(event).await,
                Some(internal) = internal_rx.recv() => self.on_internal(internal),
            }
        }
        tracing::debug!("Session actor stopped");
    }

    async fn handle_command(&mut self, command: UiCommand) {
        match command {
            UiCommand::StartConnection { api_key } => self.initialize(api_key),
            UiCommand::StartContinuousRecording => {
                let open = self.is_open();
                self.capture.start(open).await;
            }
            UiCommand::StopRecording => self.capture.stop(false),
        }
    }

    const fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open) && self.connection_open
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            connection_open: self.connection_open,
            recording: self.capture.is_recording(),
            capture_handle: self.capture.has_handle(),
            playback: self.playback.status(),
            generation: self.generation,
            reconnect_attempts: self.supervisor.attempts(),
        }
    }

    fn initialize(&mut self, api_key: Option<String>) {
        if matches!(self.state, SessionState::Initializing | SessionState::Open) {
            tracing::debug!(state = ?self.state, "Session already started");
            self.events.emit(UiEvent::HelperReady);
            return;
        }
        let Some(api_key) = api_key.filter(|key| !key.trim().is_empty()) else {
            self.events.error(Error::MissingApiKey.to_string());
            return;
        };
        self.supervisor.reset();
        self.connect(Arc::from(api_key));
    }

    /// One connect attempt. The outcome comes back as an `Internal` message.
    fn connect(&mut self, api_key: Arc<str>) {
        self.api_key = Some(Arc::clone(&api_key));
        self.generation += 1;
        self.state = SessionState::Initializing;
        self.events.emit(UiEvent::Initializing);

        let generation = self.generation;
        let setup = self.settings.setup(&self.tools);
        let connector = Arc::clone(&self.connector);
        let internal_tx = self.internal_tx.clone();
        tracing::info!(generation, model = %setup.model, "Connecting");

        tokio::spawn(async move {
            let outcome = match connector.connect(&api_key, &setup).await {
                Ok(transport) => Internal::Opened { generation, transport },
                Err(error) => Internal::ConnectFailed { generation, error },
            };
            let _ = internal_tx.send(outcome);
        });
    }

    fn on_internal(&mut self, internal: Internal) {
        match internal {
            Internal::Opened { generation, transport } => {
                if generation != self.generation || self.state != SessionState::Initializing {
                    tracing::debug!(generation, "Discarding stale connection");
                    return;
                }
                self.on_open(generation, transport);
            }
            Internal::ConnectFailed { generation, error } => {
                if generation != self.generation || self.state != SessionState::Initializing {
                    return;
                }
                self.state = SessionState::Erroring;
                self.events.error(format!("Failed to connect: {error}"));
                self.full_reset();
            }
            Internal::ReconnectDue { generation } => {
                if generation != self.generation || self.state != SessionState::Idle {
                    return;
                }
                if let Some(api_key) = self.api_key.clone() {
                    self.connect(api_key);
                }
            }
        }
    }

    fn on_open(&mut self, generation: u64, transport: Box<dyn Transport>) {
        let connection = ConnectionHandle::spawn(generation, transport, self.conn_tx.clone());
        let Some(api_key) = self.api_key.clone() else {
            connection.shutdown();
            return;
        };
        let dispatcher = ToolDispatcher::new(
            Arc::clone(&self.images),
            self.events.clone(),
            api_key,
            self.settings.image_model.clone(),
            self.settings.person_generation,
        );
        self.router = Some(ResponseRouter::new(
            self.events.clone(),
            self.playback.clone(),
            dispatcher,
            connection.sender().clone(),
        ));
        self.connection = Some(connection);
        self.connection_open = true;
        self.state = SessionState::Open;
        self.supervisor.reset();
        tracing::info!(generation, "Session open");
        self.events.emit(UiEvent::HelperReady);
    }

    fn on_connection(&mut self, notice: ConnectionNotice) {
        if notice.generation != self.generation {
            tracing::trace!(generation = notice.generation, "Ignoring event from old connection");
            return;
        }
        match notice.event {
            ConnectionEvent::Frame(frame) => {
                if let Some(router) = &mut self.router {
                    router.route(frame);
                }
            }
            ConnectionEvent::Closed(reason) => {
                let unsolicited = self.state == SessionState::Open;
                tracing::info!(%reason, unsolicited, "Connection closed");
                if unsolicited {
                    self.events.error(format!("Connection closed: {reason}"));
                }
                self.full_reset();
                if unsolicited {
                    self.schedule_reconnect();
                }
            }
            ConnectionEvent::Error(message) => {
                self.state = SessionState::Erroring;
                self.events.error(format!("Connection error: {message}"));
                self.full_reset();
            }
        }
    }

    async fn on_capture(&mut self, event: CaptureEvent) {
        if let Some(pcm) = self.capture.on_event(event) {
            self.send_audio(&pcm).await;
        }
    }

    async fn send_audio(&mut self, pcm: &[u8]) {
        if !self.is_open() {
            tracing::debug!("Dropping captured frame, connection not open");
            return;
        }
        let Some(connection) = &self.connection else {
            tracing::warn!("Connection flagged open without a connection, correcting");
            self.connection_open = false;
            self.capture.stop(true);
            return;
        };

        let message = ClientMessage::audio(&self.settings.capture_format, pcm);
        if let Err(err) = connection.sender().send(message).await {
            if err.is_connection_closed() {
                self.connection_open = false;
            }
            self.capture.stop(true);
            self.events.error(format!("Failed to send audio: {err}"));
        }
    }

    fn schedule_reconnect(&mut self) {
        let Some(api_key) = self.api_key.clone() else {
            return;
        };
        let Some(delay) = self.supervisor.next_delay() else {
            self.events.error("Reconnect attempts exhausted");
            return;
        };
        if delay.is_zero() {
            tracing::info!("Reconnecting");
            self.connect(api_key);
            return;
        }

        tracing::info!(delay_ms = delay.as_millis(), "Reconnecting after delay");
        let generation = self.generation;
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = internal_tx.send(Internal::ReconnectDue { generation });
        });
    }

    /// Back to `Idle` with nothing owned: queue, capture, playback and
    /// connection are all released.
    fn full_reset(&mut self) {
        self.playback.reset();
        self.capture.stop(true);
        if let Some(connection) = self.connection.take() {
            connection.shutdown();
        }
        self.router = None;
        self.connection_open = false;
        self.state = SessionState::Idle;
    }

    fn shutdown(&mut self) {
        self.state = SessionState::Closing;
        self.full_reset();
        self.api_key = None;
        self.generation += 1;
    }
}
