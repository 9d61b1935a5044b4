//! Wire types for the Gemini Live `BidiGenerateContent` protocol and the
//! image generation RPC.

pub mod client_messages;
pub mod models;
pub mod server_messages;
