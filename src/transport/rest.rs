use reqwest::{Client, header::HeaderValue};
use crate::protocol::models::{GeneratedImage, Image, ImageRequest, ImageResponse};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Debug, Clone, Serialize)]
struct PredictInstance {
    prompt: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
    include_rai_reason: bool,
    person_generation: &'static str,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
    rai_filtered_reason: Option<String>,
}

impl From<&ImageRequest> for PredictRequest {
    fn from(request: &ImageRequest) -> Self {
        Self {
            instances: vec![PredictInstance { prompt: request.prompt.clone() }],
            parameters: PredictParameters {
                sample_count: request.number_of_images,
                include_rai_reason: request.include_rai_reason,
                person_generation: request.person_generation.as_rest_value(),
            },
        }
    }
}

impl From<PredictResponse> for ImageResponse {
    fn from(response: PredictResponse) -> Self {
        let generated_images = response
            .predictions
            .into_iter()
            .map(|p| GeneratedImage {
                rai_reason: p.rai_filtered_reason,
                image: p.bytes_base64_encoded.map(|bytes| Image {
                    image_bytes: Some(bytes),
                    mime_type: p.mime_type,
                }),
            })
            .collect();
        Self { generated_images }
    }
}

/// An adapter for the image generation REST endpoint.
#[derive(Clone, Debug)]
pub struct ImagenRestAdapter {
    client: Client,
    base_url: String,
}

impl ImagenRestAdapter {
    /// Create a new adapter against the public endpoint.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new() -> Result<Self> {
        Self::with_endpoint(BASE_URL, DEFAULT_TIMEOUT)
    }

    /// Create a new adapter with a custom endpoint and request timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn with_endpoint(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(DEFAULT_POOL_IDLE_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Generate images for a prompt.
    ///
    /// # Errors
    /// Returns an error if the key is not a valid header value or the HTTP request fails.
    pub async fn generate_images(&self, api_key: &str, request: &ImageRequest) -> Result<ImageResponse> {
        let key = HeaderValue::from_str(api_key)?;
        let model = request.model.trim_start_matches("models/");

        tracing::debug!(model, prompt_len = request.prompt.len(), "Requesting image generation");

        let res = self
            .client
            .post(format!("{}/models/{model}:predict", self.base_url))
            .header(API_KEY_HEADER, key)
            .json(&PredictRequest::from(request))
            .send()
            .await?
            .error_for_status()?;

        let body: PredictResponse = res.json().await?;
        Ok(body.into())
    }
}
