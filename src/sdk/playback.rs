use super::audio_queue::{AudioChunk, AudioQueue};
use super::events::EventSink;
use crate::device::{OutputDevice, OutputHandle};
use crate::protocol::models::PcmFormat;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    /// A drain loop is active: opening the handle or writing chunks.
    Draining,
    /// End-of-stream was signalled; waiting for the handle to close.
    EndingStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub queued: usize,
    pub handle_open: bool,
    pub chunks_written: u64,
    /// Commands the drain task has applied so far.
    pub applied: u64,
}

#[derive(Debug)]
enum PlaybackCommand {
    Enqueue(AudioChunk),
    Interrupt,
    Clear,
    Close,
}

/// Handle to the playback drain task.
///
/// The task owns the queue and the single output handle; everything else
/// talks to it through commands, so writes never overlap.
#[derive(Debug, Clone)]
pub struct PlaybackDriver {
    tx: mpsc::UnboundedSender<PlaybackCommand>,
    status: watch::Receiver<PlaybackStatus>,
    issued: Arc<AtomicU64>,
}

impl PlaybackDriver {
    /// Spawn the drain task. It exits when every driver clone is dropped.
    #[must_use]
    pub fn spawn(device: Arc<dyn OutputDevice>, format: PcmFormat, events: EventSink) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(PlaybackStatus::default());

        let task = DrainTask {
            device,
            format,
            events,
            rx,
            status_tx,
            queue: AudioQueue::new(),
            handle: None,
            handle_open: false,
            state: PlaybackState::Idle,
            interrupted: false,
            chunks_written: 0,
            applied: 0,
        };
        tokio::spawn(task.run());

        Self {
            tx,
            status,
            issued: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn enqueue(&self, chunk: AudioChunk) {
        self.send(PlaybackCommand::Enqueue(chunk));
    }

    /// Drop every queued chunk and let the current handle end gracefully.
    pub fn interrupt(&self) {
        self.send(PlaybackCommand::Interrupt);
    }

    pub fn clear(&self) {
        self.send(PlaybackCommand::Clear);
    }

    /// Abort the output handle immediately.
    pub fn close(&self) {
        self.send(PlaybackCommand::Close);
    }

    /// Clear the queue and abort the handle.
    pub fn reset(&self) {
        self.clear();
        self.close();
    }

    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        *self.status.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.clone()
    }

    /// Wait until every command issued so far has been applied and the
    /// driver is idle with an empty queue.
    pub async fn wait_until_idle(&self) {
        let target = self.issued.load(Ordering::Acquire);
        let mut rx = self.status.clone();
        let _ = rx
            .wait_for(|s| s.applied >= target && s.state == PlaybackState::Idle && s.queued == 0)
            .await;
    }

    fn send(&self, cmd: PlaybackCommand) {
        self.issued.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(cmd).is_err() {
            tracing::warn!("Playback task is gone, command dropped");
        }
    }
}

enum Wait<T> {
    Done(T),
    Closed,
    Shutdown,
}

struct DrainTask {
    device: Arc<dyn OutputDevice>,
    format: PcmFormat,
    events: EventSink,
    rx: mpsc::UnboundedReceiver<PlaybackCommand>,
    status_tx: watch::Sender<PlaybackStatus>,
    queue: AudioQueue,
    handle: Option<Box<dyn OutputHandle>>,
    handle_open: bool,
    state: PlaybackState,
    interrupted: bool,
    chunks_written: u64,
    applied: u64,
}

impl DrainTask {
    async fn run(mut self) {
        loop {
            let running = match self.state {
                PlaybackState::Idle => match self.rx.recv().await {
                    Some(cmd) => {
                        self.apply(cmd);
                        true
                    }
                    None => false,
                },
                PlaybackState::Draining => self.step().await,
                PlaybackState::EndingStream => self.end_stream().await,
            };
            self.publish();
            if !running {
                break;
            }
        }
        self.drop_handle();
        self.publish();
        tracing::debug!("Playback task stopped");
    }

    fn publish(&self) {
        self.status_tx.send_replace(PlaybackStatus {
            state: self.state,
            queued: self.queue.len(),
            handle_open: self.handle_open,
            chunks_written: self.chunks_written,
            applied: self.applied,
        });
    }

    fn apply(&mut self, cmd: PlaybackCommand) {
        self.applied += 1;
        match cmd {
            PlaybackCommand::Enqueue(chunk) => {
                self.queue.push(chunk);
                if self.state == PlaybackState::Idle {
                    self.state = PlaybackState::Draining;
                }
            }
            PlaybackCommand::Interrupt => {
                let dropped = self.queue.clear();
                self.interrupted = self.state != PlaybackState::Idle;
                tracing::debug!(dropped, "Playback interrupted");
            }
            PlaybackCommand::Clear => {
                self.queue.clear();
            }
            PlaybackCommand::Close => {
                self.drop_handle();
                self.interrupted = false;
                self.state = self.state_after_handle();
            }
        }
    }

    fn drop_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.abort();
        }
        self.handle_open = false;
    }

    fn state_after_handle(&self) -> PlaybackState {
        if self.queue.is_empty() {
            PlaybackState::Idle
        } else {
            PlaybackState::Draining
        }
    }

    async fn step(&mut self) -> bool {
        if self.queue.is_empty() {
            return self.wind_down().await;
        }

        if self.handle.is_none() {
            match self.device.open(self.format).await {
                Ok(handle) => {
                    tracing::debug!(format = %self.format, "Opened playback handle");
                    self.handle = Some(handle);
                    self.handle_open = true;
                }
                Err(err) => {
                    let dropped = self.queue.clear();
                    self.state = PlaybackState::Idle;
                    tracing::warn!(dropped, "Dropping queued audio after open failure");
                    self.events.error(format!("Failed to open audio output: {err}"));
                    return true;
                }
            }
        }

        let Some(chunk) = self.queue.pop() else {
            return true;
        };
        let pcm = match chunk.decode() {
            Ok(pcm) => pcm,
            Err(err) => {
                tracing::warn!(error = %err, "Skipping undecodable audio chunk");
                if self.queue.is_empty() {
                    self.finish_stream().await;
                }
                return true;
            }
        };

        let Some(mut handle) = self.handle.take() else {
            return true;
        };
        let outcome = {
            let write = handle.write(&pcm);
            tokio::pin!(write);
            loop {
                tokio::select! {
                    res = &mut write => break Wait::Done(res),
                    cmd = self.rx.recv() => match cmd {
                        Some(PlaybackCommand::Close) => break Wait::Closed,
                        Some(other) => {
                            self.apply(other);
                            self.publish();
                        }
                        None => break Wait::Shutdown,
                    },
                }
            }
        };

        match outcome {
            Wait::Done(Ok(())) => {
                self.chunks_written += 1;
                self.handle = Some(handle);
                if self.queue.is_empty() {
                    self.finish_stream().await;
                }
                true
            }
            Wait::Done(Err(err)) => {
                handle.abort();
                self.handle_open = false;
                let dropped = self.queue.clear();
                self.interrupted = false;
                self.state = PlaybackState::Idle;
                tracing::warn!(dropped, "Dropping queued audio after write failure");
                self.events.error(format!("Audio playback failed: {err}"));
                true
            }
            Wait::Closed => {
                self.handle = Some(handle);
                self.apply(PlaybackCommand::Close);
                true
            }
            Wait::Shutdown => {
                handle.abort();
                self.handle_open = false;
                false
            }
        }
    }

    /// Queue ran dry at the top of a drain step.
    async fn wind_down(&mut self) -> bool {
        if self.handle.is_some() {
            if self.interrupted {
                self.finish_stream().await;
                return true;
            }
            tracing::warn!("Playback handle still open with an empty queue, force closing");
            self.drop_handle();
        }
        self.interrupted = false;
        self.state = PlaybackState::Idle;
        true
    }

    async fn finish_stream(&mut self) {
        let Some(handle) = self.handle.as_mut() else {
            self.state = self.state_after_handle();
            return;
        };
        match handle.finish().await {
            Ok(()) => self.state = PlaybackState::EndingStream,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to end playback stream, aborting handle");
                self.drop_handle();
                self.state = self.state_after_handle();
            }
        }
    }

    async fn end_stream(&mut self) -> bool {
        let Some(mut handle) = self.handle.take() else {
            self.handle_open = false;
            self.state = self.state_after_handle();
            return true;
        };
        let outcome = {
            let closed = handle.closed();
            tokio::pin!(closed);
            loop {
                tokio::select! {
                    res = &mut closed => break Wait::Done(res),
                    cmd = self.rx.recv() => match cmd {
                        Some(PlaybackCommand::Close) => break Wait::Closed,
                        Some(other) => {
                            self.apply(other);
                            self.publish();
                        }
                        None => break Wait::Shutdown,
                    },
                }
            }
        };

        match outcome {
            Wait::Done(res) => {
                if let Err(err) = res {
                    tracing::warn!(error = %err, "Playback handle closed with error");
                }
                drop(handle);
                self.handle_open = false;
                self.interrupted = false;
                self.state = self.state_after_handle();
                tracing::debug!(next = ?self.state, "Playback handle closed");
                true
            }
            Wait::Closed => {
                self.handle = Some(handle);
                self.apply(PlaybackCommand::Close);
                true
            }
            Wait::Shutdown => {
                handle.abort();
                self.handle_open = false;
                false
            }
        }
    }
}
