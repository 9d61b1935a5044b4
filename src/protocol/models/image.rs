use serde::{Deserialize, Serialize};

pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonGeneration {
    DontAllow,
    #[default]
    AllowAdult,
    AllowAll,
}

impl PersonGeneration {
    /// Value expected by the REST `predict` endpoint.
    #[must_use]
    pub const fn as_rest_value(self) -> &'static str {
        match self {
            Self::DontAllow => "dont_allow",
            Self::AllowAdult => "allow_adult",
            Self::AllowAll => "allow_all",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub number_of_images: u32,
    pub include_rai_reason: bool,
    pub person_generation: PersonGeneration,
}

impl ImageRequest {
    /// Single image, safety reason included.
    #[must_use]
    pub fn single(model: impl Into<String>, prompt: impl Into<String>, person_generation: PersonGeneration) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            number_of_images: 1,
            include_rai_reason: true,
            person_generation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Base64 encoded image bytes.
    pub image_bytes: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub rai_reason: Option<String>,
    pub image: Option<Image>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    #[serde(default)]
    pub generated_images: Vec<GeneratedImage>,
}
