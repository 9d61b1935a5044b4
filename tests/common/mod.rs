#![allow(dead_code)]

use async_trait::async_trait;
use gemini_live_rt::device::{CaptureSink, CaptureStream, InputDevice, OutputDevice, OutputHandle};
use gemini_live_rt::sdk::BoxFuture;
use gemini_live_rt::{
    ClientMessage, Connector, Error, ImageGenerator, ImageRequest, ImageResponse, PcmFormat, Result,
    ServerFrame, Setup, Transport, UiEvent, UiEvents,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const WAIT: Duration = Duration::from_secs(2);

pub async fn next_event(events: &mut UiEvents) -> UiEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for UI event")
        .expect("event channel closed")
}

/// Poll `cond` until it holds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ---------------------------------------------------------------- connection

enum Inbound {
    Frame(ServerFrame),
    Close(String),
    Error(String),
}

/// Test-side view of one mock connection.
#[derive(Clone)]
pub struct MockServer {
    inbound: mpsc::UnboundedSender<Inbound>,
    sent: Arc<Mutex<Vec<ClientMessage>>>,
    fail_sends: Arc<Mutex<Option<String>>>,
}

impl MockServer {
    pub fn frame(&self, value: Value) {
        let frame: ServerFrame = serde_json::from_value(value).expect("valid server frame");
        let _ = self.inbound.send(Inbound::Frame(frame));
    }

    pub fn close(&self, reason: &str) {
        let _ = self.inbound.send(Inbound::Close(reason.to_string()));
    }

    pub fn error(&self, message: &str) {
        let _ = self.inbound.send(Inbound::Error(message.to_string()));
    }

    pub fn fail_sends_with(&self, message: &str) {
        *self.fail_sends.lock().unwrap() = Some(message.to_string());
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_audio(&self) -> usize {
        self.sent()
            .iter()
            .filter(|m| matches!(m, ClientMessage::RealtimeInput(_)))
            .count()
    }
}

struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    sent: Arc<Mutex<Vec<ClientMessage>>>,
    fail_sends: Arc<Mutex<Option<String>>>,
    close_reason: Option<String>,
}

impl Transport for MockTransport {
    fn send(&mut self, message: ClientMessage) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if let Some(err) = self.fail_sends.lock().unwrap().clone() {
                return Err(Error::Api(err));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        })
    }

    fn next_message(&mut self) -> BoxFuture<'_, Result<Option<ServerFrame>>> {
        Box::pin(async move {
            match self.inbound.recv().await {
                Some(Inbound::Frame(frame)) => Ok(Some(frame)),
                Some(Inbound::Close(reason)) => {
                    self.close_reason = Some(reason);
                    Ok(None)
                }
                Some(Inbound::Error(message)) => Err(Error::Api(message)),
                None => std::future::pending().await,
            }
        })
    }

    fn close_reason(&self) -> Option<String> {
        self.close_reason.clone()
    }
}

pub struct MockConnector {
    servers: mpsc::UnboundedSender<MockServer>,
    connects: Arc<Mutex<Vec<(String, Setup)>>>,
    refuse: Arc<AtomicBool>,
}

pub struct ConnectorProbe {
    servers: mpsc::UnboundedReceiver<MockServer>,
    connects: Arc<Mutex<Vec<(String, Setup)>>>,
    refuse: Arc<AtomicBool>,
}

impl MockConnector {
    pub fn new() -> (Self, ConnectorProbe) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connects = Arc::new(Mutex::new(Vec::new()));
        let refuse = Arc::new(AtomicBool::new(false));
        (
            Self {
                servers: tx,
                connects: Arc::clone(&connects),
                refuse: Arc::clone(&refuse),
            },
            ConnectorProbe {
                servers: rx,
                connects,
                refuse,
            },
        )
    }
}

impl ConnectorProbe {
    pub async fn next_server(&mut self) -> MockServer {
        tokio::time::timeout(WAIT, self.servers.recv())
            .await
            .expect("timed out waiting for a connect")
            .expect("connector dropped")
    }

    pub fn connects(&self) -> Vec<(String, Setup)> {
        self.connects.lock().unwrap().clone()
    }

    pub fn refuse_connections(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }
}

impl Connector for MockConnector {
    fn connect<'a>(&'a self, api_key: &'a str, setup: &'a Setup) -> BoxFuture<'a, Result<Box<dyn Transport>>> {
        Box::pin(async move {
            self.connects.lock().unwrap().push((api_key.to_string(), setup.clone()));
            if self.refuse.load(Ordering::SeqCst) {
                return Err(Error::Api("connection refused".to_string()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            let sent = Arc::new(Mutex::new(Vec::new()));
            let fail_sends = Arc::new(Mutex::new(None));
            let _ = self.servers.send(MockServer {
                inbound: tx,
                sent: Arc::clone(&sent),
                fail_sends: Arc::clone(&fail_sends),
            });
            Ok(Box::new(MockTransport {
                inbound: rx,
                sent,
                fail_sends,
                close_reason: None,
            }) as Box<dyn Transport>)
        })
    }
}

// ---------------------------------------------------------------- microphone

#[derive(Clone, Default)]
pub struct MockMic {
    sinks: Arc<Mutex<Vec<CaptureSink>>>,
    live: Arc<AtomicUsize>,
}

struct MockCapture {
    live: Arc<AtomicUsize>,
    terminated: bool,
}

impl CaptureStream for MockCapture {
    fn detach(&mut self) {}

    fn terminate(&mut self) {
        if !self.terminated {
            self.terminated = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl InputDevice for MockMic {
    async fn open(&self, _format: PcmFormat, sink: CaptureSink) -> Result<Box<dyn CaptureStream>> {
        self.sinks.lock().unwrap().push(sink);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockCapture {
            live: Arc::clone(&self.live),
            terminated: false,
        }))
    }
}

impl MockMic {
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    fn latest(&self) -> CaptureSink {
        self.sinks.lock().unwrap().last().cloned().expect("no capture opened")
    }

    pub fn push_frame(&self, pcm: Vec<u8>) {
        self.latest().frame(pcm);
    }

    /// Report that the `index`-th opened recorder exited.
    pub fn exit(&self, index: usize, code: i32) {
        let sink = self.sinks.lock().unwrap()[index].clone();
        sink.exited(Some(code));
    }
}

// ---------------------------------------------------------------- speaker

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakerLog {
    Open(usize),
    Write(usize, Vec<u8>),
    Finish(usize),
    Closed(usize),
    Abort(usize),
}

#[derive(Clone, Default)]
pub struct MockSpeaker {
    log: Arc<Mutex<Vec<SpeakerLog>>>,
    handles: Arc<AtomicUsize>,
    writing: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
    write_delay: Duration,
    close_delay: Duration,
    fail_open: Arc<AtomicBool>,
}

impl MockSpeaker {
    pub fn with_delays(write_delay: Duration, close_delay: Duration) -> Self {
        Self {
            write_delay,
            close_delay,
            ..Self::default()
        }
    }

    pub fn log(&self) -> Vec<SpeakerLog> {
        self.log.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.log()
            .into_iter()
            .filter_map(|entry| match entry {
                SpeakerLog::Write(_, pcm) => Some(pcm),
                _ => None,
            })
            .collect()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn fail_open(&self) {
        self.fail_open.store(true, Ordering::SeqCst);
    }
}

struct MockOutput {
    id: usize,
    speaker: MockSpeaker,
}

impl MockOutput {
    fn record(&self, entry: SpeakerLog) {
        self.speaker.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl OutputDevice for MockSpeaker {
    async fn open(&self, _format: PcmFormat) -> Result<Box<dyn OutputHandle>> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(Error::Device("no output device".to_string()));
        }
        let id = self.handles.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.lock().unwrap().push(SpeakerLog::Open(id));
        Ok(Box::new(MockOutput {
            id,
            speaker: self.clone(),
        }))
    }
}

#[async_trait]
impl OutputHandle for MockOutput {
    async fn write(&mut self, pcm: &[u8]) -> Result<()> {
        if self.speaker.writing.swap(true, Ordering::SeqCst) {
            self.speaker.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.record(SpeakerLog::Write(self.id, pcm.to_vec()));
        tokio::time::sleep(self.speaker.write_delay).await;
        self.speaker.writing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.record(SpeakerLog::Finish(self.id));
        Ok(())
    }

    async fn closed(&mut self) -> Result<()> {
        tokio::time::sleep(self.speaker.close_delay).await;
        self.record(SpeakerLog::Closed(self.id));
        Ok(())
    }

    fn abort(&mut self) {
        self.speaker.writing.store(false, Ordering::SeqCst);
        self.record(SpeakerLog::Abort(self.id));
    }
}

// ---------------------------------------------------------------- images

#[derive(Clone, Default)]
pub struct MockImages {
    response: Arc<Mutex<Option<ImageResponse>>>,
    requests: Arc<Mutex<Vec<(String, ImageRequest)>>>,
    delay: Duration,
}

impl MockImages {
    pub fn returning(response: ImageResponse) -> Self {
        Self {
            response: Arc::new(Mutex::new(Some(response))),
            ..Self::default()
        }
    }

    /// Every request takes `delay` before it answers.
    pub fn with_delay(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }

    pub fn requests(&self) -> Vec<(String, ImageRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for MockImages {
    async fn generate(&self, api_key: &str, request: ImageRequest) -> Result<ImageResponse> {
        self.requests.lock().unwrap().push((api_key.to_string(), request));
        tokio::time::sleep(self.delay).await;
        self.response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::ImageGeneration("quota exceeded".to_string()))
    }
}

/// 16-bit PCM bytes as the server would send them.
pub fn audio_frame(pcm: &[u8]) -> Value {
    use base64::Engine as _;
    serde_json::json!({
        "serverContent": {
            "modelTurn": { "parts": [{
                "inlineData": {
                    "mimeType": "audio/pcm;rate=24000",
                    "data": base64::engine::general_purpose::STANDARD.encode(pcm),
                }
            }] }
        }
    })
}
