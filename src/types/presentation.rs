//! Slide deck shape

use super::StructuredOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A slide deck
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    /// Deck title
    pub title: String,
    /// Slides in presentation order
    pub slides: Vec<Slide>,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    /// 1-based slide number
    pub number: u32,
    pub title: String,
    /// Bullet points shown on the slide
    pub bullets: Vec<String>,
    /// Notes for the presenter, not shown on the slide
    pub speaker_notes: String,
}

impl StructuredOutput for Presentation {
    fn check(&self) -> Result<(), String> {
        if self.slides.is_empty() {
            return Err("presentation has no slides".to_string());
        }
        Ok(())
    }
}
