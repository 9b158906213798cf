//! Structured output types the model is constrained to produce
//!
//! Each content type has one strongly-typed shape. The JSON schema sent to the
//! model is derived from these definitions, and responses are validated by
//! deserialising back into them.

mod assignment;
mod document;
mod general;
mod image;
mod lecture;
mod lesson_plan;
mod presentation;
mod quiz;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::classifier::ContentType;

pub use assignment::{Assignment, AssignmentTask, RubricCriterion};
pub use document::{Document, DocumentSection};
pub use general::GeneralResponse;
pub use image::GeneratedImage;
pub use lecture::{Lecture, LectureSection};
pub use lesson_plan::{LessonActivity, LessonPlan};
pub use presentation::{Presentation, Slide};
pub use quiz::{Quiz, QuizQuestion};

/// A type the model can be asked to fill in.
pub trait StructuredOutput: Serialize + DeserializeOwned + JsonSchema {
    /// Constraints that deserialisation alone cannot express.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A validated result, one variant per content type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeneratedContent {
    LessonPlan(LessonPlan),
    Assignment(Assignment),
    Quiz(Quiz),
    Lecture(Lecture),
    Presentation(Presentation),
    Document(Document),
    General(GeneralResponse),
}

impl GeneratedContent {
    /// Title shared by every shape
    pub fn title(&self) -> &str {
        match self {
            Self::LessonPlan(plan) => &plan.title,
            Self::Assignment(assignment) => &assignment.title,
            Self::Quiz(quiz) => &quiz.title,
            Self::Lecture(lecture) => &lecture.title,
            Self::Presentation(deck) => &deck.title,
            Self::Document(doc) => &doc.title,
            Self::General(general) => &general.title,
        }
    }

    /// Content type this result was generated for
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::LessonPlan(_) => ContentType::LessonPlan,
            Self::Assignment(_) => ContentType::Assignment,
            Self::Quiz(_) => ContentType::Quiz,
            Self::Lecture(_) => ContentType::Lecture,
            Self::Presentation(_) => ContentType::Presentation,
            Self::Document(_) => ContentType::Document,
            Self::General(_) => ContentType::Default,
        }
    }

    pub fn as_quiz(&self) -> Option<&Quiz> {
        match self {
            Self::Quiz(quiz) => Some(quiz),
            _ => None,
        }
    }
}
