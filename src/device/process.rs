use super::{CaptureSink, CaptureStream, InputDevice, OutputDevice, OutputHandle};
use crate::config::{CaptureSection, PlaybackSection};
use crate::error::{Error, Result};
use crate::protocol::models::PcmFormat;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;

fn expand_args(args: &[String], format: PcmFormat) -> Vec<String> {
    args.iter()
        .map(|arg| {
            arg.replace("{rate}", &format.sample_rate.to_string())
                .replace("{channels}", &format.channels.to_string())
        })
        .collect()
}

fn spawn_error(program: &str, err: &std::io::Error) -> Error {
    Error::Device(format!("failed to start {program}: {err}"))
}

/// Records raw PCM from a recorder process's stdout (`arecord` by default).
#[derive(Debug, Clone)]
pub struct ProcessInputDevice {
    program: String,
    args: Vec<String>,
    read_size: usize,
}

impl ProcessInputDevice {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, read_size: usize) -> Self {
        Self {
            program: program.into(),
            args,
            read_size: read_size.max(1),
        }
    }

    #[must_use]
    pub fn from_config(section: &CaptureSection) -> Self {
        Self::new(section.program.clone(), section.args.clone(), section.read_size)
    }
}

#[async_trait]
impl InputDevice for ProcessInputDevice {
    async fn open(&self, format: PcmFormat, sink: CaptureSink) -> Result<Box<dyn CaptureStream>> {
        let args = expand_args(&self.args, format);
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.program, &e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Device(format!("{} has no stdout", self.program)))?;

        tracing::debug!(program = %self.program, ?args, capture = sink.id(), "Recorder started");

        let detached = Arc::new(AtomicBool::new(false));
        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(run_recorder(child, stdout, self.read_size, sink, Arc::clone(&detached), kill_rx));

        Ok(Box::new(ProcessCaptureStream {
            detached,
            kill: Some(kill_tx),
        }))
    }
}

async fn run_recorder(
    mut child: Child,
    mut stdout: tokio::process::ChildStdout,
    read_size: usize,
    sink: CaptureSink,
    detached: Arc<AtomicBool>,
    mut kill_rx: oneshot::Receiver<()>,
) {
    let mut buf = vec![0u8; read_size];
    let mut reading = true;
    let mut killed = false;

    loop {
        tokio::select! {
            read = stdout.read(&mut buf), if reading => {
                match read {
                    Ok(0) => reading = false,
                    Ok(n) => {
                        if !detached.load(Ordering::Acquire) {
                            sink.frame(buf[..n].to_vec());
                        }
                    }
                    Err(err) => {
                        reading = false;
                        if !detached.load(Ordering::Acquire) {
                            sink.error(err.to_string());
                        }
                    }
                }
            }
            _ = &mut kill_rx, if !killed => {
                killed = true;
                if let Err(err) = child.start_kill() {
                    tracing::debug!(error = %err, "Recorder already gone");
                }
            }
            status = child.wait() => {
                let code = match status {
                    Ok(status) => status.code(),
                    Err(err) => {
                        tracing::warn!(error = %err, "Failed to collect recorder exit status");
                        None
                    }
                };
                tracing::debug!(capture = sink.id(), ?code, "Recorder exited");
                sink.exited(code);
                break;
            }
        }
    }
}

/// Handle to a running recorder process.
#[derive(Debug)]
pub struct ProcessCaptureStream {
    detached: Arc<AtomicBool>,
    kill: Option<oneshot::Sender<()>>,
}

impl CaptureStream for ProcessCaptureStream {
    fn detach(&mut self) {
        self.detached.store(true, Ordering::Release);
    }

    fn terminate(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

impl Drop for ProcessCaptureStream {
    fn drop(&mut self) {
        self.detach();
        self.terminate();
    }
}

/// Plays raw PCM by piping it into a player process (`aplay` by default).
#[derive(Debug, Clone)]
pub struct ProcessOutputDevice {
    program: String,
    args: Vec<String>,
}

impl ProcessOutputDevice {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    #[must_use]
    pub fn from_config(section: &PlaybackSection) -> Self {
        Self::new(section.program.clone(), section.args.clone())
    }
}

#[async_trait]
impl OutputDevice for ProcessOutputDevice {
    async fn open(&self, format: PcmFormat) -> Result<Box<dyn OutputHandle>> {
        let args = expand_args(&self.args, format);
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.program, &e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Device(format!("{} has no stdin", self.program)))?;

        tracing::debug!(program = %self.program, %format, "Player started");

        Ok(Box::new(ProcessOutputHandle {
            child,
            stdin: Some(stdin),
        }))
    }
}

#[derive(Debug)]
pub struct ProcessOutputHandle {
    child: Child,
    stdin: Option<ChildStdin>,
}

#[async_trait]
impl OutputHandle for ProcessOutputHandle {
    async fn write(&mut self, pcm: &[u8]) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Device("player input already closed".to_string()))?;
        stdin.write_all(pcm).await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush().await?;
            stdin.shutdown().await?;
        }
        Ok(())
    }

    async fn closed(&mut self) -> Result<()> {
        let status = self.child.wait().await?;
        if !status.success() {
            tracing::debug!(code = ?status.code(), "Player exited with failure status");
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.stdin = None;
        if let Err(err) = self.child.start_kill() {
            tracing::debug!(error = %err, "Player already gone");
        }
    }
}
