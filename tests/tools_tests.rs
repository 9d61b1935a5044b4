mod common;

use common::MockImages;
use gemini_live_rt::protocol::models::{GeneratedImage, Image};
use gemini_live_rt::{
    EventSink, FunctionCall, ImageResponse, PersonGeneration, ToolDispatcher, ToolRegistry, UiEvent, UiEvents,
};
use serde_json::json;
use std::sync::Arc;

fn dispatcher(images: &MockImages) -> (ToolDispatcher, UiEvents) {
    let (sink, events) = EventSink::channel();
    let dispatcher = ToolDispatcher::new(
        Arc::new(images.clone()),
        sink,
        "key-1",
        "imagen-test",
        PersonGeneration::AllowAdult,
    );
    (dispatcher, events)
}

fn image_call(args: serde_json::Value) -> FunctionCall {
    FunctionCall {
        id: Some("call-1".to_string()),
        name: "generate_image".to_string(),
        args,
    }
}

fn blocked(reason: &str) -> ImageResponse {
    ImageResponse {
        generated_images: vec![GeneratedImage {
            rai_reason: Some(reason.to_string()),
            image: None,
        }],
    }
}

#[tokio::test]
async fn blocked_image_emits_only_blocked() {
    let images = MockImages::returning(blocked("person filter"));
    let (tools, mut events) = dispatcher(&images);

    let response = tools
        .dispatch(&image_call(json!({ "image_prompt": "a portrait" })))
        .await
        .unwrap();

    assert_eq!(
        events.drain(),
        vec![
            UiEvent::GeminiImageGenerating,
            UiEvent::GeminiImageBlocked {
                reason: "person filter".to_string()
            },
        ]
    );
    assert_eq!(response.response["status"], "blocked");
    assert_eq!(response.id.as_deref(), Some("call-1"));
}

#[tokio::test]
async fn request_carries_prompt_model_and_key() {
    let images = MockImages::returning(blocked("x"));
    let (tools, _events) = dispatcher(&images);
    tools
        .dispatch(&image_call(json!({ "image_prompt": "a red fox" })))
        .await;

    let requests = images.requests();
    assert_eq!(requests.len(), 1);
    let (key, request) = &requests[0];
    assert_eq!(key, "key-1");
    assert_eq!(request.model, "imagen-test");
    assert_eq!(request.prompt, "a red fox");
    assert_eq!(request.number_of_images, 1);
    assert!(request.include_rai_reason);
}

#[tokio::test]
async fn missing_prompt_makes_no_request_and_no_event() {
    let images = MockImages::returning(blocked("x"));
    let (tools, mut events) = dispatcher(&images);

    assert!(tools.dispatch(&image_call(json!({}))).await.is_none());
    assert!(tools.dispatch(&image_call(json!({ "image_prompt": 42 }))).await.is_none());
    assert!(images.requests().is_empty());
    assert!(events.drain().is_empty());
}

#[tokio::test]
async fn response_without_image_data_is_an_error() {
    let images = MockImages::returning(ImageResponse {
        generated_images: vec![GeneratedImage {
            rai_reason: None,
            image: Some(Image::default()),
        }],
    });
    let (tools, mut events) = dispatcher(&images);

    let response = tools
        .dispatch(&image_call(json!({ "image_prompt": "a boat" })))
        .await
        .unwrap();

    let drained = events.drain();
    assert_eq!(drained[0], UiEvent::GeminiImageGenerating);
    assert!(matches!(&drained[1], UiEvent::HelperError { error } if error.contains("no image data")));
    assert_eq!(drained.len(), 2);
    assert_eq!(response.response["status"], "error");
}

#[tokio::test]
async fn empty_prediction_list_is_an_error() {
    let images = MockImages::returning(ImageResponse::default());
    let (tools, mut events) = dispatcher(&images);

    tools
        .dispatch(&image_call(json!({ "image_prompt": "a boat" })))
        .await
        .unwrap();
    assert!(
        events
            .drain()
            .iter()
            .any(|e| matches!(e, UiEvent::HelperError { error } if error.contains("no image data")))
    );
}

#[tokio::test]
async fn rpc_failure_is_reported() {
    let images = MockImages::default();
    let (tools, mut events) = dispatcher(&images);

    let response = tools
        .dispatch(&image_call(json!({ "image_prompt": "a boat" })))
        .await
        .unwrap();

    let drained = events.drain();
    assert_eq!(drained[0], UiEvent::GeminiImageGenerating);
    assert!(matches!(&drained[1], UiEvent::HelperError { error } if error.contains("quota exceeded")));
    assert_eq!(response.response["status"], "error");
}

#[tokio::test]
async fn unknown_function_is_ignored() {
    let images = MockImages::returning(blocked("x"));
    let (tools, mut events) = dispatcher(&images);

    let call = FunctionCall {
        id: Some("c".to_string()),
        name: "launch_rocket".to_string(),
        args: json!({}),
    };
    assert!(tools.dispatch(&call).await.is_none());
    assert!(events.drain().is_empty());
    assert!(images.requests().is_empty());
}

#[derive(schemars::JsonSchema)]
#[allow(dead_code)]
struct WeatherArgs {
    /// City name
    city: String,
}

#[test]
fn custom_functions_are_declared_alongside_defaults() {
    let mut registry = ToolRegistry::with_defaults().unwrap();
    registry.function::<WeatherArgs>("get_weather", "Current weather").unwrap();

    let names: Vec<_> = registry.declarations().iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["generate_image", "get_weather"]);

    let tools = serde_json::to_value(registry.as_tools()).unwrap();
    let text = tools.to_string();
    assert!(text.contains("googleSearch"), "{text}");
    assert!(text.contains("\"city\""), "{text}");
    assert!(!text.contains("$schema"), "{text}");
}
