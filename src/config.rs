use crate::classifier::ContentType;
use crate::client::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, GeminiClient};
use crate::error::ForgeError;
use crate::log_debug;
use crate::orchestrator::{DEFAULT_SESSION_CONTENT_TYPES, Orchestrator, OrchestratorSettings};
use crate::request::{DEFAULT_IMAGE_MODEL, DEFAULT_MODEL, ModelSettings};
use crate::retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_JITTER, RetryPolicy};
use crate::session::{DEFAULT_CAPACITY, DEFAULT_IDLE_TTL_MINUTES, InMemorySessionStore};

use anyhow::{Context, Result, anyhow};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const MODEL_ENV: &str = "LESSONSMITH_MODEL";
pub const PORT_ENV: &str = "LESSONSMITH_PORT";

/// Configuration for the lessonsmith service
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub retry: RetryConfig,
    pub sessions: SessionConfig,
    pub server: ServerConfig,
}

/// Remote model settings
#[derive(Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    /// Only ever taken from the environment
    #[serde(skip)]
    pub api_key: String,
    pub model: String,
    pub image_model: String,
    pub base_url: String,
    pub temperature: Option<f32>,
    pub request_timeout_seconds: u64,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "[REDACTED]" })
            .field("model", &self.model)
            .field("image_model", &self.image_model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

/// Backoff for transient upstream failures
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: u64::try_from(DEFAULT_BASE_DELAY.as_millis()).unwrap_or(u64::MAX),
            max_jitter_ms: u64::try_from(DEFAULT_MAX_JITTER.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Conversation session limits
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub capacity: usize,
    pub idle_ttl_minutes: i64,
    /// Content types a conversation may produce besides `default`
    pub content_types: Vec<ContentType>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            idle_ttl_minutes: DEFAULT_IDLE_TTL_MINUTES,
            content_types: DEFAULT_SESSION_CONTENT_TYPES.to_vec(),
        }
    }
}

/// HTTP listener settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Where uploads are staged; the system temp dir when unset
    pub staging_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            staging_dir: None,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("lessonsmith-uploads"))
    }
}

impl Config {
    /// Load from `path`, or the default location when `None`, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(anyhow!("Config file not found: {}", path.display()));
                }
                Some(path.to_path_buf())
            }
            None => Self::default_path().filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;

        log_debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).map_err(|e| {
            anyhow!(
                "Invalid configuration file format: {}. Please check {} for syntax errors.",
                e,
                path.display()
            )
        })
    }

    /// `$CONFIG_DIR/lessonsmith/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("lessonsmith").join("config.toml"))
    }

    /// Apply overrides from an environment-like lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.gemini.api_key = key;
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|m| !m.trim().is_empty()) {
            self.gemini.model = model;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("{PORT_ENV} is not a valid port: {port}"))?;
        }
        Ok(())
    }

    /// Fail when something the service cannot run without is absent.
    pub fn validate(&self) -> Result<(), ForgeError> {
        if self.gemini.api_key.trim().is_empty() {
            return Err(ForgeError::ConfigurationMissing(format!(
                "{API_KEY_ENV} is not set"
            )));
        }
        if self.gemini.model.trim().is_empty() {
            return Err(ForgeError::ConfigurationMissing("gemini.model".to_string()));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )
        .with_max_jitter(Duration::from_millis(self.retry.max_jitter_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.gemini.request_timeout_seconds.max(1))
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            model: ModelSettings {
                model: self.gemini.model.clone(),
                image_model: self.gemini.image_model.clone(),
                temperature: self.gemini.temperature,
            },
            retry: self.retry_policy(),
            session_content_types: self.sessions.content_types.clone(),
        }
    }

    pub fn session_store(&self) -> InMemorySessionStore {
        InMemorySessionStore::new(
            self.sessions.capacity,
            chrono::Duration::minutes(self.sessions.idle_ttl_minutes),
        )
    }

    /// Validate, then wire the Gemini client and session store into an
    /// [`Orchestrator`].
    pub fn build_orchestrator(&self) -> Result<Orchestrator> {
        self.validate()?;
        let client = GeminiClient::with_options(
            self.gemini.api_key.clone(),
            self.gemini.base_url.clone(),
            self.request_timeout(),
        )?;
        Ok(Orchestrator::new(
            Arc::new(client),
            Arc::new(self.session_store()),
            self.orchestrator_settings(),
        ))
    }
}
