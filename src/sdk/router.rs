use super::audio_queue::AudioChunk;
use super::connection::ConnectionSender;
use super::events::{EventSink, UiEvent};
use super::playback::PlaybackDriver;
use super::tools::ToolDispatcher;
use crate::protocol::client_messages::ClientMessage;
use crate::protocol::models::FunctionCall;
use crate::protocol::server_messages::{ContentPart, ServerFrame, ServerMessage};
use std::sync::Arc;
use tokio::task::JoinSet;

type Messages = std::vec::IntoIter<ServerMessage>;

/// Demultiplexes inbound frames for one connection.
///
/// Tool calls run on tasks owned by the router, so dropping it with the
/// connection aborts any call still in flight.
pub struct ResponseRouter {
    inner: Arc<RouterInner>,
    tasks: JoinSet<()>,
}

struct RouterInner {
    events: EventSink,
    playback: PlaybackDriver,
    tools: ToolDispatcher,
    replies: ConnectionSender,
}

impl ResponseRouter {
    #[must_use]
    pub fn new(events: EventSink, playback: PlaybackDriver, tools: ToolDispatcher, replies: ConnectionSender) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                events,
                playback,
                tools,
                replies,
            }),
            tasks: JoinSet::new(),
        }
    }

    pub fn route(&mut self, frame: ServerFrame) {
        while self.tasks.try_join_next().is_some() {}

        let mut messages = frame.into_iter();
        let Some(call) = self.inner.route_until_call(&mut messages) else {
            return;
        };
        // The rest of the frame waits for the call; later frames do not.
        let inner = Arc::clone(&self.inner);
        self.tasks.spawn(async move {
            let mut next = Some(call);
            while let Some(call) = next {
                inner.run_tool(call).await;
                next = inner.route_until_call(&mut messages);
            }
        });
    }
}

impl Drop for ResponseRouter {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            tracing::debug!(pending = self.tasks.len(), "Aborting in-flight tool calls");
        }
        self.tasks.abort_all();
    }
}

impl RouterInner {
    /// Route messages until a tool call turns up; the call is handed back.
    fn route_until_call(&self, messages: &mut Messages) -> Option<FunctionCall> {
        for message in messages.by_ref() {
            match message {
                ServerMessage::SetupComplete => tracing::debug!("Setup complete"),
                ServerMessage::Interrupted => {
                    tracing::debug!("Model interrupted, flushing playback");
                    self.playback.interrupt();
                    return None;
                }
                ServerMessage::Content(ContentPart::Text(text)) => {
                    self.events.emit(UiEvent::GeminiTextResponse { text });
                }
                ServerMessage::Content(ContentPart::InlineAudio(blob)) => {
                    self.playback.enqueue(AudioChunk::new(blob));
                }
                ServerMessage::ToolCall(call) => return Some(call),
                ServerMessage::TurnComplete => self.events.emit(UiEvent::GeminiTurnComplete),
                ServerMessage::ToolCallCancellation { ids } => {
                    tracing::debug!(?ids, "Tool calls cancelled by server");
                }
                ServerMessage::ResumptionUpdate { new_handle, resumable } => {
                    tracing::debug!(?new_handle, resumable, "Session resumption update");
                }
                ServerMessage::GoAway { time_left } => {
                    tracing::warn!(?time_left, "Server will close the connection soon");
                }
            }
        }
        None
    }

    async fn run_tool(&self, call: FunctionCall) {
        let Some(response) = self.tools.dispatch(&call).await else {
            return;
        };
        if call.id.is_none() {
            return;
        }
        if let Err(err) = self.replies.send(ClientMessage::tool_response(response)).await {
            tracing::debug!(error = %err, name = %call.name, "Tool response not delivered");
        }
    }
}
