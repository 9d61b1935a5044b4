use super::transport::Transport;
use crate::protocol::client_messages::ClientMessage;
use crate::protocol::server_messages::ServerFrame;
use crate::{Error, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Error as WsError;

const COMMAND_BUFFER: usize = 64;
const DEFAULT_CLOSE_REASON: &str = "connection closed";

#[derive(Debug)]
pub enum ConnectionEvent {
    Frame(ServerFrame),
    /// The remote side closed the connection.
    Closed(String),
    Error(String),
}

/// A connection event tagged with the connect attempt it came from.
#[derive(Debug)]
pub struct ConnectionNotice {
    pub generation: u64,
    pub event: ConnectionEvent,
}

enum Command {
    SendWithResponse {
        message: ClientMessage,
        respond: oneshot::Sender<Result<()>>,
    },
}

/// Cloneable sending side of a connection pump.
#[derive(Debug, Clone)]
pub struct ConnectionSender {
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SendWithResponse { message, .. } => write!(f, "SendWithResponse({})", message.kind()),
        }
    }
}

impl ConnectionSender {
    /// Send a message and wait until it is on the wire.
    ///
    /// # Errors
    /// Returns the transport error, or `ConnectionClosed` if the pump is gone.
    pub async fn send(&self, message: ClientMessage) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::SendWithResponse { message, respond: tx })
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)?
    }
}

/// Owns the task that pumps one transport.
#[derive(Debug)]
pub struct ConnectionHandle {
    generation: u64,
    sender: ConnectionSender,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Start pumping `transport`. Inbound frames and the final close or error
    /// are posted to `notices`.
    pub fn spawn(
        generation: u64,
        transport: Box<dyn Transport>,
        notices: mpsc::UnboundedSender<ConnectionNotice>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(pump(generation, transport, rx, notices));
        Self {
            generation,
            sender: ConnectionSender { tx },
            task,
        }
    }

    #[must_use]
    pub const fn sender(&self) -> &ConnectionSender {
        &self.sender
    }

    /// Drop the transport without waiting for the remote side.
    pub fn shutdown(self) {
        self.task.abort();
        tracing::debug!(generation = self.generation, "Connection pump stopped");
    }
}

fn is_remote_close(err: &Error) -> bool {
    matches!(
        err,
        Error::ConnectionClosed | Error::WebSocket(WsError::ConnectionClosed | WsError::AlreadyClosed)
    )
}

async fn pump(
    generation: u64,
    mut transport: Box<dyn Transport>,
    mut cmd_rx: mpsc::Receiver<Command>,
    notices: mpsc::UnboundedSender<ConnectionNotice>,
) {
    let notify = |event: ConnectionEvent| notices.send(ConnectionNotice { generation, event }).is_ok();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::SendWithResponse { message, respond }) => {
                        let result = transport.send(message).await;
                        let _ = respond.send(result);
                    }
                    None => break,
                }
            }
            msg = transport.next_message() => {
                match msg {
                    Ok(Some(frame)) => {
                        if !notify(ConnectionEvent::Frame(frame)) {
                            break;
                        }
                    }
                    Ok(None) => {
                        let reason = transport
                            .close_reason()
                            .unwrap_or_else(|| DEFAULT_CLOSE_REASON.to_string());
                        notify(ConnectionEvent::Closed(reason));
                        break;
                    }
                    Err(err) if is_remote_close(&err) => {
                        notify(ConnectionEvent::Closed(err.to_string()));
                        break;
                    }
                    Err(err) => {
                        notify(ConnectionEvent::Error(err.to_string()));
                        break;
                    }
                }
            }
        }
    }
    tracing::debug!(generation, "Connection pump finished");
}
