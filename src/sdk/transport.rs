use crate::protocol::client_messages::ClientMessage;
use crate::protocol::models::Setup;
use crate::protocol::server_messages::ServerFrame;
use crate::{LiveClient, Result};
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One established Live connection.
pub trait Transport: Send {
    fn send(&mut self, message: ClientMessage) -> BoxFuture<'_, Result<()>>;
    /// `Ok(None)` means the remote side closed the connection.
    fn next_message(&mut self) -> BoxFuture<'_, Result<Option<ServerFrame>>>;
    fn close_reason(&self) -> Option<String> {
        None
    }
}

/// Opens connections. The returned transport has already sent `setup`.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, api_key: &'a str, setup: &'a Setup) -> BoxFuture<'a, Result<Box<dyn Transport>>>;
}

pub struct WsTransport {
    client: LiveClient,
}

impl WsTransport {
    pub const fn new(client: LiveClient) -> Self {
        Self { client }
    }
}

impl Transport for WsTransport {
    fn send(&mut self, message: ClientMessage) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.client.send(message))
    }

    fn next_message(&mut self) -> BoxFuture<'_, Result<Option<ServerFrame>>> {
        Box::pin(self.client.next_message())
    }

    fn close_reason(&self) -> Option<String> {
        self.client.close_reason().map(str::to_string)
    }
}

/// Connects over WebSocket, optionally against a non-default endpoint.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    base_url: Option<String>,
}

impl WsConnector {
    #[must_use]
    pub const fn new(base_url: Option<String>) -> Self {
        Self { base_url }
    }
}

impl Connector for WsConnector {
    fn connect<'a>(&'a self, api_key: &'a str, setup: &'a Setup) -> BoxFuture<'a, Result<Box<dyn Transport>>> {
        Box::pin(async move {
            let mut client = LiveClient::connect(api_key, self.base_url.as_deref()).await?;
            client.send(ClientMessage::Setup(Box::new(setup.clone()))).await?;
            tracing::debug!(model = %setup.model, handle = ?setup.resumption_handle(), "Setup sent");
            Ok(Box::new(WsTransport::new(client)) as Box<dyn Transport>)
        })
    }
}
