//! Lecture notes shape

use super::StructuredOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lecture script broken into sections
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lecture {
    pub title: String,
    /// Short introduction to the topic
    pub overview: String,
    pub sections: Vec<LectureSection>,
    /// Closing recap
    pub summary: String,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LectureSection {
    pub heading: String,
    /// Full spoken or written content of the section
    pub content: String,
    pub key_points: Vec<String>,
}

impl StructuredOutput for Lecture {}
