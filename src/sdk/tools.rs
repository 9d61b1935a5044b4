use super::events::{EventSink, UiEvent};
use crate::Result;
use crate::protocol::models::{
    FunctionCall, FunctionDeclaration, FunctionResponse, GoogleSearch, ImageRequest, ImageResponse,
    PersonGeneration, Tool,
};
use crate::transport::rest::ImagenRestAdapter;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

pub const GENERATE_IMAGE: &str = "generate_image";
const GENERATE_IMAGE_DESCRIPTION: &str =
    "Generate an image from a text description and show it to the user.";

/// Arguments of `generate_image`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GenerateImageArgs {
    /// A detailed description of the image to generate.
    pub image_prompt: String,
}

/// Tool declarations sent with the session setup.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    defs: Vec<FunctionDeclaration>,
    google_search: bool,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Search grounding plus `generate_image`.
    ///
    /// # Errors
    /// Returns an error if the argument schema cannot be serialized.
    #[allow(clippy::result_large_err)]
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        registry.google_search();
        registry.function::<GenerateImageArgs>(GENERATE_IMAGE, GENERATE_IMAGE_DESCRIPTION)?;
        Ok(registry)
    }

    pub const fn google_search(&mut self) {
        self.google_search = true;
    }

    /// Declare a function whose parameters are described by `TArgs`.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be serialized.
    #[allow(clippy::result_large_err)]
    pub fn function<TArgs: JsonSchema>(&mut self, name: &str, description: impl Into<String>) -> Result<()> {
        let schema = schemars::schema_for!(TArgs);
        let mut parameters = serde_json::to_value(&schema)?;
        if let Value::Object(map) = &mut parameters {
            map.remove("$schema");
            map.remove("title");
        }
        self.defs.push(FunctionDeclaration {
            name: name.to_string(),
            description: Some(description.into()),
            parameters,
        });
        Ok(())
    }

    #[must_use]
    pub fn declarations(&self) -> &[FunctionDeclaration] {
        &self.defs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty() && !self.google_search
    }

    #[must_use]
    pub fn as_tools(&self) -> Vec<Tool> {
        let mut tools = Vec::with_capacity(2);
        if self.google_search {
            tools.push(Tool::GoogleSearch(GoogleSearch {}));
        }
        if !self.defs.is_empty() {
            tools.push(Tool::FunctionDeclarations(self.defs.clone()));
        }
        tools
    }
}

/// The image generation RPC.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, api_key: &str, request: ImageRequest) -> Result<ImageResponse>;
}

#[async_trait]
impl ImageGenerator for ImagenRestAdapter {
    async fn generate(&self, api_key: &str, request: ImageRequest) -> Result<ImageResponse> {
        self.generate_images(api_key, &request).await
    }
}

/// Executes function calls from the model. Failures become UI events and
/// never propagate.
#[derive(Clone)]
pub struct ToolDispatcher {
    generator: Arc<dyn ImageGenerator>,
    events: EventSink,
    api_key: Arc<str>,
    model: String,
    person_generation: PersonGeneration,
}

impl ToolDispatcher {
    #[must_use]
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        events: EventSink,
        api_key: impl Into<Arc<str>>,
        model: impl Into<String>,
        person_generation: PersonGeneration,
    ) -> Self {
        Self {
            generator,
            events,
            api_key: api_key.into(),
            model: model.into(),
            person_generation,
        }
    }

    /// Run one call. Returns the summary to send back to the model, or
    /// `None` when the call was ignored.
    pub async fn dispatch(&self, call: &FunctionCall) -> Option<FunctionResponse> {
        let response = match call.name.as_str() {
            GENERATE_IMAGE => self.generate_image(call).await?,
            other => {
                tracing::warn!(name = other, "Ignoring call to unknown function");
                return None;
            }
        };
        Some(FunctionResponse {
            id: call.id.clone(),
            name: call.name.clone(),
            response,
        })
    }

    async fn generate_image(&self, call: &FunctionCall) -> Option<Value> {
        let Some(prompt) = call.str_arg("image_prompt") else {
            tracing::warn!(args = %call.args, "generate_image called without image_prompt");
            return None;
        };

        tracing::info!(prompt, "Generating image");
        self.events.emit(UiEvent::GeminiImageGenerating);

        let request = ImageRequest::single(self.model.clone(), prompt, self.person_generation);
        let response = match self.generator.generate(&self.api_key, request).await {
            Ok(response) => response,
            Err(err) => {
                self.events.error(format!("Image generation failed: {err}"));
                return Some(json!({ "status": "error", "error": err.to_string() }));
            }
        };

        let first = response.generated_images.into_iter().next().unwrap_or_default();
        if let Some(reason) = first.rai_reason {
            tracing::info!(%reason, "Image blocked by safety filter");
            self.events.emit(UiEvent::GeminiImageBlocked { reason: reason.clone() });
            return Some(json!({ "status": "blocked", "reason": reason }));
        }
        match first.image.and_then(|image| image.image_bytes) {
            Some(image) => {
                self.events.emit(UiEvent::GeminiImageGenerated { image });
                Some(json!({ "status": "generated" }))
            }
            None => {
                self.events.error("Image generation failed: no image data");
                Some(json!({ "status": "error", "error": "no image data" }))
            }
        }
    }
}
