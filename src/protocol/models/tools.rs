use serde::{Deserialize, Serialize};

use super::JsonSchema;

/// Function the model may call, declared in the session setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the arguments (intentionally untyped).
    pub parameters: JsonSchema,
}

/// Empty marker object enabling search grounding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct GoogleSearch {}

/// One tool entry of the setup message. Each variant serializes as a
/// single-key object, e.g. `{"googleSearch": {}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Tool {
    GoogleSearch(GoogleSearch),
    FunctionDeclarations(Vec<FunctionDeclaration>),
}
