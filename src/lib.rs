//! Lessonsmith - schema-constrained teaching material generation
//!
//! This library classifies teaching requests into content types, asks a Gemini
//! model for JSON constrained to the matching schema, validates the result, and
//! keeps multi-turn conversations in bounded in-memory sessions.

#![allow(clippy::uninlined_format_args)] // Style preference
#![allow(clippy::return_self_not_must_use)] // Builder pattern is clear enough
#![allow(clippy::module_name_repetitions)]

pub mod attachment;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logger;
pub mod orchestrator;
pub mod request;
pub mod retry;
pub mod schema;
pub mod server;
pub mod session;
pub mod types;

pub use attachment::Attachment;
pub use classifier::{ContentType, classify, classify_among};
pub use client::{GeminiClient, GenerateContentResponse, GenerativeModel};
pub use config::Config;
pub use error::{ForgeError, Result, UpstreamErrorKind};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use request::{ConversationTurn, Role};
pub use retry::RetryPolicy;
pub use session::{InMemorySessionStore, SessionId, SessionStore};
pub use types::{GeneratedContent, GeneratedImage};
