//! Session runtime: one actor task owns the connection, capture and
//! playback, and talks to the front-end through `UiCommand`/`UiEvent`.

mod audio_queue;
mod builder;
mod capture;
mod connection;
pub mod events;
mod playback;
mod router;
mod session;
mod supervisor;
mod tools;
mod transport;

pub use audio_queue::{AudioChunk, AudioQueue};
pub use builder::{LiveHelper, LiveHelperBuilder};
pub use capture::CaptureDriver;
pub use connection::{ConnectionEvent, ConnectionHandle, ConnectionNotice, ConnectionSender};
pub use events::{EventSink, UiCommand, UiEvent, UiEvents};
pub use playback::{PlaybackDriver, PlaybackState, PlaybackStatus};
pub use router::ResponseRouter;
pub use session::{SessionHandle, SessionSettings, SessionState, SessionStatus};
pub use supervisor::{ReconnectPolicy, ReconnectSupervisor};
pub use tools::{GENERATE_IMAGE, GenerateImageArgs, ImageGenerator, ToolDispatcher, ToolRegistry};
pub use transport::{BoxFuture, Connector, Transport, WsConnector, WsTransport};
