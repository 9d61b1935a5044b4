use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP protocol error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse or serialize JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Header error: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Gemini API error: {0}")]
    Api(String),

    #[error("API key is required to start a session")]
    MissingApiKey,

    #[error("No open session")]
    NotConnected,

    #[error("The connection was closed unexpectedly")]
    ConnectionClosed,

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Image generation failed: {0}")]
    ImageGeneration(String),

    #[error("Invalid client message: {0}")]
    InvalidClientMessage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error means the underlying connection is gone.
    ///
    /// Send paths use this to decide between "stop capture" and
    /// "stop capture and mark the connection as no longer open".
    #[must_use]
    pub fn is_connection_closed(&self) -> bool {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match self {
            Self::ConnectionClosed | Self::NotConnected => true,
            Self::WebSocket(WsError::ConnectionClosed | WsError::AlreadyClosed) => true,
            other => other.to_string().to_ascii_lowercase().contains("closed"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
