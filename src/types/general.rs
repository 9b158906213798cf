//! Fallback shape for prompts that match no specific content type

use super::StructuredOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Free-form answer with a title
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneralResponse {
    pub title: String,
    /// Answer body in markdown
    pub content: String,
}

impl StructuredOutput for GeneralResponse {}
