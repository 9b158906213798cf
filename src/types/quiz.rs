//! Quiz shape

use super::StructuredOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Multiple-choice quiz
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    /// Quiz title
    pub title: String,
    /// Questions in order
    pub questions: Vec<QuizQuestion>,
}

/// A single multiple-choice question
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    /// 1-based sequence number
    pub number: u32,
    /// The question text
    pub question: String,
    /// Answer options in display order
    pub choices: Vec<String>,
    /// The correct answer, matching one of the choices
    pub answer: String,
}

impl StructuredOutput for Quiz {
    fn check(&self) -> Result<(), String> {
        if self.questions.is_empty() {
            return Err("quiz has no questions".to_string());
        }
        for question in &self.questions {
            if question.question.trim().is_empty() {
                return Err(format!("question {} has no text", question.number));
            }
            if question.choices.is_empty() {
                return Err(format!("question {} has no choices", question.number));
            }
            if question.answer.trim().is_empty() {
                return Err(format!("question {} has no answer", question.number));
            }
        }
        Ok(())
    }
}
