//! Assignment shape

use super::StructuredOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Take-home or in-class assignment with grading rubric
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Assignment title
    pub title: String,
    /// Instructions addressed to the student
    pub instructions: String,
    /// Learning objectives
    pub objectives: Vec<String>,
    /// Numbered tasks
    pub tasks: Vec<AssignmentTask>,
    /// Grading criteria
    pub rubric: Vec<RubricCriterion>,
    /// Format, length and deadline guidance
    pub submission_guidelines: String,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentTask {
    /// 1-based task number
    pub number: u32,
    pub description: String,
    /// Points available for this task
    pub points: u32,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RubricCriterion {
    pub criterion: String,
    pub points: u32,
    pub description: String,
}

impl StructuredOutput for Assignment {
    fn check(&self) -> Result<(), String> {
        if self.tasks.is_empty() {
            return Err("assignment has no tasks".to_string());
        }
        Ok(())
    }
}
