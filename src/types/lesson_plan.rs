//! Lesson plan shape

use super::StructuredOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A complete plan for teaching one lesson
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
    /// Lesson title
    pub title: String,
    /// Subject area, e.g. "Biology"
    pub subject: String,
    /// Intended grade or level
    pub grade_level: String,
    /// Total lesson length, e.g. "45 minutes"
    pub duration: String,
    /// What students should be able to do afterwards
    pub objectives: Vec<String>,
    /// Materials and resources needed
    pub materials: Vec<String>,
    /// Activities in teaching order
    pub activities: Vec<LessonActivity>,
    /// How learning will be checked
    pub assessment: String,
    /// Follow-up work, empty if none
    pub homework: String,
}

/// One timed activity within a lesson
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonActivity {
    pub name: String,
    pub duration: String,
    pub description: String,
}

impl StructuredOutput for LessonPlan {
    fn check(&self) -> Result<(), String> {
        if self.activities.is_empty() {
            return Err("lesson plan has no activities".to_string());
        }
        Ok(())
    }
}
