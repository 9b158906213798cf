//! Schema registry: content type to response schema and system instruction.
//!
//! Every [`ContentType`] resolves through an exhaustive `match`, so a new
//! variant does not compile until it has a shape, a schema and an instruction.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::classifier::ContentType;
use crate::error::{ForgeError, Result};
use crate::log_debug;
use crate::types::{
    Assignment, Document, GeneralResponse, GeneratedContent, Lecture, LessonPlan, Presentation,
    Quiz, StructuredOutput,
};

/// Question count used when the prompt does not name one
pub const DEFAULT_QUIZ_QUESTIONS: u32 = 20;

static QUESTION_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*questions?").expect("Failed to compile question count pattern")
});

static LESSON_PLAN_SCHEMA: LazyLock<SchemaDescriptor> =
    LazyLock::new(|| SchemaDescriptor::of::<LessonPlan>("LessonPlan"));
static ASSIGNMENT_SCHEMA: LazyLock<SchemaDescriptor> =
    LazyLock::new(|| SchemaDescriptor::of::<Assignment>("Assignment"));
static QUIZ_SCHEMA: LazyLock<SchemaDescriptor> =
    LazyLock::new(|| SchemaDescriptor::of::<Quiz>("Quiz"));
static LECTURE_SCHEMA: LazyLock<SchemaDescriptor> =
    LazyLock::new(|| SchemaDescriptor::of::<Lecture>("Lecture"));
static PRESENTATION_SCHEMA: LazyLock<SchemaDescriptor> =
    LazyLock::new(|| SchemaDescriptor::of::<Presentation>("Presentation"));
static DOCUMENT_SCHEMA: LazyLock<SchemaDescriptor> =
    LazyLock::new(|| SchemaDescriptor::of::<Document>("Document"));
static GENERAL_SCHEMA: LazyLock<SchemaDescriptor> =
    LazyLock::new(|| SchemaDescriptor::of::<GeneralResponse>("GeneralResponse"));

const LESSON_PLAN_INSTRUCTION: &str = "You are an experienced teacher and curriculum designer. \
    Write a complete, classroom-ready lesson plan for the request. Objectives must be \
    measurable, activities must be timed and add up to the stated duration, and the \
    assessment must check the objectives. Use an encouraging, professional tone.";

const ASSIGNMENT_INSTRUCTION: &str = "You are an experienced teacher writing an assignment. \
    Address the instructions to the student, number the tasks from 1, give each task a \
    point value, and provide a rubric whose points add up to the task total. Keep the \
    difficulty appropriate for the level implied by the request.";

const LECTURE_INSTRUCTION: &str = "You are a university lecturer preparing lecture notes. \
    Start with a short overview, develop the topic across well-ordered sections with the \
    full content a lecturer would say, list key points per section, and close with a \
    summary. Be accurate and explain terminology when first used.";

const PRESENTATION_INSTRUCTION: &str = "You are a presentation designer and researcher. \
    Produce a slide deck for the request: number slides from 1, keep bullets short and \
    scannable, and put the explanation a presenter needs into the speaker notes. Build \
    on earlier turns of the conversation when they are relevant.";

const DOCUMENT_INSTRUCTION: &str = "You are a careful research writer. Produce a well-structured \
    document with a concise summary, sections written in markdown, and a list of \
    references when sources are used. Build on earlier turns of the conversation when \
    they are relevant. Do not invent citations.";

const GENERAL_INSTRUCTION: &str = "You are a knowledgeable teaching assistant. Answer the \
    request clearly and accurately. Give the answer a short descriptive title and write \
    the body in markdown.";

/// JSON schema describing one structured output shape, in the subset the
/// Gemini `responseSchema` field accepts
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    pub name: &'static str,
    pub schema: Value,
}

impl SchemaDescriptor {
    fn of<T: StructuredOutput>(name: &'static str) -> Self {
        let generated = schemars::schema_for!(T).to_value();
        Self {
            name,
            schema: to_response_schema(&generated),
        }
    }
}

/// System instruction conditioning the model for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInstruction(String);

impl SystemInstruction {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SystemInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the request builder needs for one content type
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub content_type: ContentType,
    pub schema: &'static SchemaDescriptor,
    pub instruction: SystemInstruction,
}

/// Resolve the schema and instruction for a content type.
///
/// The prompt is only consulted for parameterised instructions (the quiz
/// question count).
pub fn resolve(content_type: ContentType, prompt: &str) -> ResolvedSchema {
    let (schema, instruction): (&'static SchemaDescriptor, String) = match content_type {
        ContentType::LessonPlan => (&*LESSON_PLAN_SCHEMA, LESSON_PLAN_INSTRUCTION.to_string()),
        ContentType::Assignment => (&*ASSIGNMENT_SCHEMA, ASSIGNMENT_INSTRUCTION.to_string()),
        ContentType::Quiz => (&*QUIZ_SCHEMA, quiz_instruction(quiz_question_count(prompt))),
        ContentType::Lecture => (&*LECTURE_SCHEMA, LECTURE_INSTRUCTION.to_string()),
        ContentType::Presentation => {
            (&*PRESENTATION_SCHEMA, PRESENTATION_INSTRUCTION.to_string())
        }
        ContentType::Document => (&*DOCUMENT_SCHEMA, DOCUMENT_INSTRUCTION.to_string()),
        ContentType::Default => (&*GENERAL_SCHEMA, GENERAL_INSTRUCTION.to_string()),
    };

    ResolvedSchema {
        content_type,
        schema,
        instruction: SystemInstruction(instruction),
    }
}

/// Number of quiz questions requested in the prompt.
///
/// Takes the first integer directly before "question"/"questions"; falls back
/// to [`DEFAULT_QUIZ_QUESTIONS`] when absent, zero, or out of range.
pub fn quiz_question_count(prompt: &str) -> u32 {
    QUESTION_COUNT
        .captures(prompt)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|count| *count > 0)
        .unwrap_or(DEFAULT_QUIZ_QUESTIONS)
}

fn quiz_instruction(count: u32) -> String {
    format!(
        "You are an experienced teacher writing a multiple-choice quiz. Write exactly {count} \
         questions, numbered from 1. Every question has four plausible choices and exactly \
         one correct answer; the answer field must repeat the correct choice verbatim. Cover \
         the topic evenly and avoid trick questions."
    )
}

/// Parse and validate raw model text against the schema of `content_type`.
pub fn parse(content_type: ContentType, raw: &str) -> Result<GeneratedContent> {
    let body = strip_code_fence(raw);
    match content_type {
        ContentType::LessonPlan => {
            parse_as::<LessonPlan>(content_type, body, raw).map(GeneratedContent::LessonPlan)
        }
        ContentType::Assignment => {
            parse_as::<Assignment>(content_type, body, raw).map(GeneratedContent::Assignment)
        }
        ContentType::Quiz => parse_as::<Quiz>(content_type, body, raw).map(GeneratedContent::Quiz),
        ContentType::Lecture => {
            parse_as::<Lecture>(content_type, body, raw).map(GeneratedContent::Lecture)
        }
        ContentType::Presentation => {
            parse_as::<Presentation>(content_type, body, raw).map(GeneratedContent::Presentation)
        }
        ContentType::Document => {
            parse_as::<Document>(content_type, body, raw).map(GeneratedContent::Document)
        }
        ContentType::Default => {
            parse_as::<GeneralResponse>(content_type, body, raw).map(GeneratedContent::General)
        }
    }
}

fn parse_as<T: StructuredOutput>(content_type: ContentType, body: &str, raw: &str) -> Result<T> {
    let malformed = |reason: String| ForgeError::MalformedModelOutput {
        content_type,
        reason,
        raw: raw.to_string(),
    };

    let value: T = serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
    value.check().map_err(malformed)?;
    log_debug!("Parsed {} output ({} chars)", content_type, raw.len());
    Ok(value)
}

/// Structured output is plain JSON, but some models still wrap it in a
/// markdown fence.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence
    inner
        .split_once('\n')
        .map_or(inner, |(tag, body)| {
            if tag.trim().chars().all(char::is_alphanumeric) {
                body
            } else {
                inner
            }
        })
        .trim()
}

/// Keys the Gemini `responseSchema` understands. Everything else is dropped.
const RESPONSE_SCHEMA_KEYS: &[&str] = &[
    "type",
    "description",
    "enum",
    "nullable",
    "minItems",
    "maxItems",
];

/// Convert a schemars JSON schema into Gemini's OpenAPI-style subset.
///
/// `$ref`s into `$defs` are inlined, `["T", "null"]` type unions and
/// `anyOf` with a null branch become `nullable`, and unsupported keywords
/// are removed.
pub fn to_response_schema(root: &Value) -> Value {
    let empty = Map::new();
    let defs = root
        .get("$defs")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    convert_node(root, defs)
}

fn convert_node(node: &Value, defs: &Map<String, Value>) -> Value {
    let Some(obj) = node.as_object() else {
        return node.clone();
    };

    if let Some(target) = obj
        .get("$ref")
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix("#/$defs/"))
        .and_then(|name| defs.get(name))
    {
        let mut resolved = convert_node(target, defs);
        if let (Some(desc), Some(out)) = (obj.get("description"), resolved.as_object_mut()) {
            out.insert("description".to_string(), desc.clone());
        }
        return resolved;
    }

    if let Some(variants) = obj.get("anyOf").and_then(Value::as_array) {
        let non_null: Vec<&Value> = variants
            .iter()
            .filter(|v| v.get("type").and_then(Value::as_str) != Some("null"))
            .collect();
        if let [single] = non_null.as_slice() {
            let mut resolved = convert_node(single, defs);
            if let Some(out) = resolved.as_object_mut() {
                if non_null.len() < variants.len() {
                    out.insert("nullable".to_string(), Value::Bool(true));
                }
                if let Some(desc) = obj.get("description") {
                    out.insert("description".to_string(), desc.clone());
                }
            }
            return resolved;
        }
    }

    let mut out = Map::new();
    for key in RESPONSE_SCHEMA_KEYS {
        if let Some(value) = obj.get(*key) {
            out.insert((*key).to_string(), value.clone());
        }
    }

    if let Some(Value::Array(types)) = obj.get("type") {
        let concrete: Vec<&Value> = types.iter().filter(|t| t.as_str() != Some("null")).collect();
        if let Some(first) = concrete.first() {
            out.insert("type".to_string(), (*first).clone());
        }
        if concrete.len() < types.len() {
            out.insert("nullable".to_string(), Value::Bool(true));
        }
    }

    if let Some(props) = obj.get("properties").and_then(Value::as_object) {
        let converted: Map<String, Value> = props
            .iter()
            .map(|(name, prop)| (name.clone(), convert_node(prop, defs)))
            .collect();
        out.insert("properties".to_string(), Value::Object(converted));
    }

    if let Some(required) = obj.get("required") {
        out.insert("required".to_string(), required.clone());
    }

    if let Some(items) = obj.get("items") {
        out.insert("items".to_string(), convert_node(items, defs));
    }

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    #[test]
    fn test_quiz_count_extracted_from_prompt() {
        assert_eq!(quiz_question_count("Make a quiz with 15 questions"), 15);
        assert_eq!(quiz_question_count("Make a quiz with 1 question"), 1);
        assert_eq!(quiz_question_count("10 QUESTIONS on the Tudors"), 10);
        assert_eq!(
            quiz_question_count("Grade 7 quiz, 12 questions please, not 30 questions"),
            12
        );
    }

    #[test]
    fn test_quiz_count_defaults_to_twenty() {
        assert_eq!(quiz_question_count("Make a quiz"), DEFAULT_QUIZ_QUESTIONS);
        assert_eq!(quiz_question_count("a quiz for grade 7"), DEFAULT_QUIZ_QUESTIONS);
        assert_eq!(quiz_question_count("0 questions"), DEFAULT_QUIZ_QUESTIONS);
    }

    #[test]
    fn test_quiz_instruction_carries_count_but_schema_does_not_change() {
        let fifteen = resolve(ContentType::Quiz, "quiz with 15 questions");
        let default = resolve(ContentType::Quiz, "quiz");
        assert!(fifteen.instruction.as_str().contains("exactly 15 questions"));
        assert!(default.instruction.as_str().contains("exactly 20 questions"));
        assert_eq!(fifteen.schema, default.schema);
    }

    #[test]
    fn test_every_content_type_resolves() {
        for content_type in ContentType::iter() {
            let resolved = resolve(content_type, "anything");
            assert_eq!(resolved.content_type, content_type);
            assert!(!resolved.instruction.as_str().is_empty());
            assert_eq!(resolved.schema.schema["type"], "object");
        }
    }

    #[test]
    fn test_quiz_schema_is_inlined_and_requires_question_fields() {
        let schema = &resolve(ContentType::Quiz, "").schema.schema;
        let text = schema.to_string();
        assert!(!text.contains("$ref"));
        assert!(!text.contains("$defs"));
        assert!(!text.contains("$schema"));

        let question = &schema["properties"]["questions"]["items"];
        assert_eq!(question["type"], "object");
        let required: Vec<&str> = question["required"]
            .as_array()
            .expect("required list")
            .iter()
            .filter_map(Value::as_str)
            .collect();
        for field in ["number", "question", "choices", "answer"] {
            assert!(required.contains(&field), "{field} should be required");
        }
        assert_eq!(question["properties"]["choices"]["type"], "array");
        assert_eq!(question["properties"]["choices"]["items"]["type"], "string");
    }

    #[test]
    fn test_nullable_unions_are_rewritten() {
        let input = json!({
            "type": "object",
            "properties": {
                "note": { "type": ["string", "null"], "format": "uri" },
                "child": { "anyOf": [{ "$ref": "#/$defs/Child" }, { "type": "null" }] }
            },
            "additionalProperties": false,
            "$defs": {
                "Child": { "type": "object", "properties": { "n": { "type": "integer", "format": "uint32", "minimum": 0 } } }
            }
        });

        let out = to_response_schema(&input);
        assert_eq!(out["properties"]["note"], json!({ "type": "string", "nullable": true }));
        assert_eq!(out["properties"]["child"]["nullable"], true);
        assert_eq!(
            out["properties"]["child"]["properties"]["n"],
            json!({ "type": "integer" })
        );
        assert!(out.get("additionalProperties").is_none());
    }

    #[test]
    fn test_parse_accepts_valid_quiz() {
        let raw = r#"{"title":"Fractions","questions":[{"number":1,"question":"Half of 4?","choices":["1","2"],"answer":"2"}]}"#;
        let parsed = parse(ContentType::Quiz, raw).expect("valid quiz");
        let quiz = parsed.as_quiz().expect("quiz variant");
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].answer, "2");
    }

    #[test]
    fn test_parse_strips_markdown_fence() {
        let raw = "```json\n{\"title\":\"Hi\",\"content\":\"Body\"}\n```";
        let parsed = parse(ContentType::Default, raw).expect("fenced json");
        assert_eq!(parsed.title(), "Hi");
    }

    #[test]
    fn test_parse_rejects_missing_required_field() {
        let raw = r#"{"title":"Deck"}"#;
        let err = parse(ContentType::Presentation, raw).expect_err("slides missing");
        match err {
            ForgeError::MalformedModelOutput {
                content_type,
                reason,
                raw: kept,
            } => {
                assert_eq!(content_type, ContentType::Presentation);
                assert!(reason.contains("slides"));
                assert_eq!(kept, raw);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = parse(ContentType::Document, "Sure! Here is your document.")
            .expect_err("not json");
        assert!(matches!(err, ForgeError::MalformedModelOutput { .. }));
    }

    #[test]
    fn test_parse_rejects_quiz_question_without_choices() {
        let raw = r#"{"title":"Q","questions":[{"number":1,"question":"?","choices":[],"answer":"a"}]}"#;
        assert!(matches!(
            parse(ContentType::Quiz, raw),
            Err(ForgeError::MalformedModelOutput { .. })
        ));
    }
}
