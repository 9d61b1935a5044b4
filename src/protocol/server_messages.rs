use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::models::{Blob, Content, FunctionCall};

/// Content carried by the first part of a model turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    /// Base64 audio exactly as received; decoding happens at playback.
    InlineAudio(Blob),
}

/// A single inbound signal, decoded once at the connection boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    SetupComplete,
    /// The model was cut off by user speech. Exclusive of other content.
    Interrupted,
    Content(ContentPart),
    ToolCall(FunctionCall),
    ToolCallCancellation { ids: Vec<String> },
    TurnComplete,
    ResumptionUpdate { new_handle: Option<String>, resumable: bool },
    GoAway { time_left: Option<String> },
}

/// Everything one wire message carried, in processing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerFrame {
    messages: Vec<ServerMessage>,
}

impl ServerFrame {
    #[must_use]
    pub const fn new(messages: Vec<ServerMessage>) -> Self {
        Self { messages }
    }

    #[must_use]
    pub fn messages(&self) -> &[ServerMessage] {
        &self.messages
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self.messages.first(), Some(ServerMessage::Interrupted))
    }
}

impl IntoIterator for ServerFrame {
    type Item = ServerMessage;
    type IntoIter = std::vec::IntoIter<ServerMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

impl<'de> Deserialize<'de> for ServerFrame {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        WireServerMessage::deserialize(deserializer).map(Self::from)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireServerMessage {
    setup_complete: Option<Value>,
    server_content: Option<WireServerContent>,
    tool_call: Option<WireToolCall>,
    tool_call_cancellation: Option<WireToolCallCancellation>,
    go_away: Option<WireGoAway>,
    session_resumption_update: Option<WireResumptionUpdate>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireServerContent {
    model_turn: Option<Content>,
    #[serde(default)]
    interrupted: bool,
    #[serde(default)]
    turn_complete: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireToolCall {
    #[serde(default)]
    function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Deserialize, Default)]
struct WireToolCallCancellation {
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireGoAway {
    time_left: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireResumptionUpdate {
    new_handle: Option<String>,
    #[serde(default)]
    resumable: bool,
}

impl From<WireServerMessage> for ServerFrame {
    fn from(wire: WireServerMessage) -> Self {
        let mut messages = Vec::new();

        if wire.setup_complete.is_some() {
            messages.push(ServerMessage::SetupComplete);
        }

        let content = wire.server_content.unwrap_or_default();
        if content.interrupted {
            return Self::new(vec![ServerMessage::Interrupted]);
        }

        if let Some(first) = content.model_turn.and_then(|turn| turn.parts.into_iter().next()) {
            if let Some(text) = first.text {
                messages.push(ServerMessage::Content(ContentPart::Text(text)));
            }
            if let Some(blob) = first.inline_data {
                messages.push(ServerMessage::Content(ContentPart::InlineAudio(blob)));
            }
        }

        if let Some(call) = wire.tool_call.and_then(|tc| tc.function_calls.into_iter().next()) {
            messages.push(ServerMessage::ToolCall(call));
        }

        if content.turn_complete {
            messages.push(ServerMessage::TurnComplete);
        }

        if let Some(cancel) = wire.tool_call_cancellation {
            messages.push(ServerMessage::ToolCallCancellation { ids: cancel.ids });
        }
        if let Some(update) = wire.session_resumption_update {
            messages.push(ServerMessage::ResumptionUpdate {
                new_handle: update.new_handle,
                resumable: update.resumable,
            });
        }
        if let Some(go_away) = wire.go_away {
            messages.push(ServerMessage::GoAway { time_left: go_away.time_left });
        }

        Self::new(messages)
    }
}
