//! Prompt classification into content types.
//!
//! Classification is a pure keyword lookup against a fixed table of keyword
//! groups, each carrying an explicit priority. Keywords match whole words,
//! case-insensitively, with an optional plural ending, so "exam" matches
//! "exams" but not "example". The best (lowest) priority matched anywhere in
//! the prompt wins; equal priorities fall back to table order.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Kind of structured content a prompt asks for
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum ContentType {
    LessonPlan,
    Assignment,
    Quiz,
    Lecture,
    Presentation,
    Document,
    #[default]
    Default,
}

impl ContentType {
    /// Wire label, e.g. `lessonPlan`
    pub fn label(self) -> &'static str {
        self.into()
    }
}

/// One row of the keyword table
#[derive(Debug, Clone, Copy)]
pub struct KeywordGroup {
    pub content_type: ContentType,
    /// Lower value wins
    pub priority: u8,
    /// Lowercase words or phrases
    pub keywords: &'static [&'static str],
}

/// Keyword table in declaration order. Ties on priority resolve to the row
/// declared first.
pub const KEYWORD_TABLE: &[KeywordGroup] = &[
    KeywordGroup {
        content_type: ContentType::LessonPlan,
        priority: 1,
        keywords: &["lesson plan", "lesson"],
    },
    KeywordGroup {
        content_type: ContentType::Assignment,
        priority: 2,
        keywords: &["assignment", "homework", "worksheet"],
    },
    KeywordGroup {
        content_type: ContentType::Quiz,
        priority: 2,
        keywords: &["quiz", "exam", "multiple choice"],
    },
    KeywordGroup {
        content_type: ContentType::Lecture,
        priority: 3,
        keywords: &["lecture", "lecture notes"],
    },
    KeywordGroup {
        content_type: ContentType::Presentation,
        priority: 4,
        keywords: &["presentation", "slides", "slide deck", "powerpoint"],
    },
    KeywordGroup {
        content_type: ContentType::Document,
        priority: 5,
        keywords: &["document", "report", "essay", "research"],
    },
];

/// One compiled pattern per row of [`KEYWORD_TABLE`], in the same order
static GROUP_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    KEYWORD_TABLE
        .iter()
        .map(|group| keyword_pattern(group.keywords))
        .collect()
});

fn keyword_pattern(keywords: &[&str]) -> Regex {
    let alternatives = keywords
        .iter()
        .map(|kw| regex::escape(kw))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternatives})(?:s|es|zes)?\b"))
        .expect("Failed to compile keyword pattern")
}

/// Classify a prompt against the full keyword table.
pub fn classify(prompt: &str) -> ContentType {
    classify_with(prompt, |_| true)
}

/// Classify a prompt considering only groups whose type is in `allowed`.
///
/// `ContentType::Default` is the answer when nothing allowed matches, whether
/// or not it appears in `allowed`.
pub fn classify_among(prompt: &str, allowed: &[ContentType]) -> ContentType {
    classify_with(prompt, |content_type| allowed.contains(&content_type))
}

fn classify_with(prompt: &str, include: impl Fn(ContentType) -> bool) -> ContentType {
    let mut best: Option<&KeywordGroup> = None;
    for (group, pattern) in KEYWORD_TABLE.iter().zip(GROUP_PATTERNS.iter()) {
        if !include(group.content_type) {
            continue;
        }
        if best.is_some_and(|current| current.priority <= group.priority) {
            continue;
        }
        if pattern.is_match(prompt) {
            best = Some(group);
        }
    }

    best.map_or(ContentType::Default, |group| group.content_type)
}
