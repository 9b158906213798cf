//! Long-form document shape

use super::StructuredOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Research-style document
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub title: String,
    /// Abstract or executive summary
    pub summary: String,
    pub sections: Vec<DocumentSection>,
    /// Sources cited, empty if none
    pub references: Vec<String>,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSection {
    pub heading: String,
    /// Section body in markdown
    pub body: String,
}

impl StructuredOutput for Document {}
