pub mod audio;
pub mod content;
pub mod image;
pub mod setup;
pub mod tools;

pub use audio::PcmFormat;
pub use content::{Blob, Content, FunctionCall, FunctionResponse, Part};
pub use image::{DEFAULT_IMAGE_MODEL, GeneratedImage, Image, ImageRequest, ImageResponse, PersonGeneration};
pub use setup::{
    DEFAULT_MODEL, DEFAULT_RESUMPTION_HANDLE, DEFAULT_VOICE, GenerationConfig, Modality,
    PrebuiltVoiceConfig, SessionResumptionConfig, Setup, SpeechConfig, VoiceConfig,
};
pub use tools::{FunctionDeclaration, GoogleSearch, Tool};

/// JSON Schema / tool parameter definitions are intentionally untyped.
pub type JsonSchema = serde_json::Value;
