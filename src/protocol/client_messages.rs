use base64::Engine as _;
use base64::engine::general_purpose;
use serde::{Deserialize, Serialize};

use super::models::{Blob, FunctionResponse, PcmFormat, Setup};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    #[serde(default)]
    pub media_chunks: Vec<Blob>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    #[serde(default)]
    pub function_responses: Vec<FunctionResponse>,
}

/// Messages sent to the Live API. Externally tagged, so each message is a
/// single-key object such as `{"realtimeInput": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Box<Setup>),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

impl ClientMessage {
    /// Wrap raw PCM bytes as one base64 realtime media chunk.
    #[must_use]
    pub fn audio(format: &PcmFormat, pcm: &[u8]) -> Self {
        Self::RealtimeInput(RealtimeInput {
            media_chunks: vec![Blob {
                mime_type: format.mime_type(),
                data: general_purpose::STANDARD.encode(pcm),
            }],
        })
    }

    #[must_use]
    pub fn tool_response(response: FunctionResponse) -> Self {
        Self::ToolResponse(ToolResponse {
            function_responses: vec![response],
        })
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::RealtimeInput(_) => "realtimeInput",
            Self::ToolResponse(_) => "toolResponse",
        }
    }
}
