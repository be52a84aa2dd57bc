//! Configuration types for Gemini Studio.
//!
//! Configuration is read from `studio.json`. Every field has a default, so a
//! missing file or an empty object yields a working setup. The API key itself
//! is never stored here; only the name of the environment variable holding it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "studio.json";

/// Upper bound on questions requested per quiz.
pub const MAX_QUESTION_COUNT: u32 = 20;

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_quiz_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_chat_model() -> String {
    "gemini-3-pro-preview".to_string()
}

const fn default_question_count() -> u32 {
    5
}

const fn default_true() -> bool {
    true
}

const fn default_thinking_budget() -> u32 {
    32_768
}

fn default_system_instruction() -> String {
    "You are a helpful and intelligent quiz and learning assistant.".to_string()
}

/// Default per-request timeout on provider calls, in seconds.
const fn default_request_timeout() -> u64 {
    120
}

/// Default request body limit: 20 MiB.
const fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8080
}

/// Main configuration for the studio server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Environment variable that holds the Gemini API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the Gemini REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for each action.
    #[serde(default)]
    pub models: ModelConfig,

    /// Number of questions requested per quiz.
    #[serde(default = "default_question_count")]
    pub question_count: u32,

    /// Attach the search grounding tool to quiz generation.
    #[serde(default = "default_true")]
    pub search_grounding: bool,

    /// Token budget for extended-reasoning chat.
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: u32,

    /// System instruction for direct-mode chat.
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,

    /// Timeout applied to each provider request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How quizzes with malformed questions are handled.
    #[serde(default)]
    pub malformed_questions: MalformedQuestionPolicy,

    /// Maximum accepted request body size.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            models: ModelConfig::default(),
            question_count: default_question_count(),
            search_grounding: default_true(),
            thinking_budget: default_thinking_budget(),
            system_instruction: default_system_instruction(),
            request_timeout_secs: default_request_timeout(),
            malformed_questions: MalformedQuestionPolicy::default(),
            max_upload_bytes: default_max_upload_bytes(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `studio.json` exists but is invalid.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            StudioError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `studio.json` from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::ConfigParseError` if the file cannot be read or
    /// holds invalid JSON, and `StudioError::ConfigValidationError` if a value
    /// is out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(StudioError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| StudioError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::ConfigValidationError` on the first failing check.
    pub fn validate(&self) -> Result<()> {
        if self.api_key_env.trim().is_empty() {
            return Err(StudioError::config_validation(
                "apiKeyEnv must not be empty",
                "Set apiKeyEnv to the environment variable holding your key, e.g. \"GEMINI_API_KEY\"",
            ));
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(StudioError::config_validation(
                format!("baseUrl '{}' is not an http(s) URL", self.base_url),
                "Set baseUrl to an http:// or https:// URL in your studio.json",
            ));
        }

        self.models.validate()?;

        if self.question_count == 0 || self.question_count > MAX_QUESTION_COUNT {
            return Err(StudioError::config_validation(
                format!(
                    "questionCount must be between 1 and {MAX_QUESTION_COUNT}, got {}",
                    self.question_count
                ),
                "Set questionCount to a value such as 5 in your studio.json",
            ));
        }

        if self.thinking_budget == 0 {
            return Err(StudioError::config_validation(
                "thinkingBudget must be greater than 0",
                "Set thinkingBudget to a positive token count in your studio.json",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(StudioError::config_validation(
                "requestTimeoutSecs must be greater than 0",
                "Set requestTimeoutSecs to at least 1 second in your studio.json",
            ));
        }

        if self.max_upload_bytes == 0 {
            return Err(StudioError::config_validation(
                "maxUploadBytes must be greater than 0",
                "Set maxUploadBytes to the largest accepted upload in bytes in your studio.json",
            ));
        }

        if self.host.trim().is_empty() {
            return Err(StudioError::config_validation(
                "host must not be empty",
                "Set host to an address such as \"127.0.0.1\" in your studio.json",
            ));
        }

        Ok(())
    }

    /// Returns the listen address as `host:port`.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Model names per action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Quiz generation model.
    #[serde(default = "default_quiz_model")]
    pub quiz: String,

    /// Image editing model.
    #[serde(default = "default_image_model")]
    pub image: String,

    /// Conversational model, used for both chat modes.
    #[serde(default = "default_chat_model")]
    pub chat: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            quiz: default_quiz_model(),
            image: default_image_model(),
            chat: default_chat_model(),
        }
    }
}

impl ModelConfig {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("models.quiz", &self.quiz),
            ("models.image", &self.image),
            ("models.chat", &self.chat),
        ] {
            if value.trim().is_empty() {
                return Err(StudioError::config_validation(
                    format!("{field} must not be empty"),
                    format!("Set {field} to a Gemini model name in your studio.json"),
                ));
            }
        }
        Ok(())
    }
}

/// What to do with a generated quiz whose questions break the contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedQuestionPolicy {
    /// Reject the whole quiz as a provider failure (default).
    #[default]
    Reject,
    /// Install the quiz as returned and score by literal equality.
    Display,
}

impl MalformedQuestionPolicy {
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "reject" => Some(Self::Reject),
            "display" => Some(Self::Display),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for MalformedQuestionPolicy {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid malformed question policy '{s}': expected one of 'reject', 'display'"
            ))
        })
    }
}

impl Serialize for MalformedQuestionPolicy {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Reject => "reject",
            Self::Display => "display",
        };
        serializer.serialize_str(s)
    }
}
