//! Error types for Gemini Studio.
//!
//! This module defines the error hierarchy for every studio operation,
//! including configuration loading, input preconditions, provider calls,
//! in-flight request tracking, and the quiz session state machine.

use std::path::PathBuf;

use crate::action::ActionOrigin;

/// A specialized `Result` type for studio operations.
pub type Result<T> = std::result::Result<T, StudioError>;

/// Errors that can occur while serving the studio.
///
/// Variants are grouped by subsystem. Provider failures carry technical detail
/// for the logs; the user only ever sees [`ActionOrigin::failure_notice`].
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your studio.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Input Preconditions
    // ========================================================================
    /// Quiz topic was empty or whitespace-only.
    #[error("Topic must not be empty")]
    EmptyTopic,

    /// Chat prompt was empty or whitespace-only.
    #[error("Message must not be empty")]
    EmptyPrompt,

    /// Image transform requested without a source image.
    #[error("No source image has been uploaded")]
    MissingImage,

    /// Image transform requested without an instruction.
    #[error("Instruction must not be empty")]
    MissingInstruction,

    /// Uploaded image could not be decoded or has an unsupported media type.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Selected option is outside the question's option list.
    #[error("Option {option} is out of range (question has {option_count} options)")]
    OptionOutOfRange {
        /// The rejected option index.
        option: usize,
        /// Number of options on the question.
        option_count: usize,
    },

    // ========================================================================
    // Quiz Contract
    // ========================================================================
    /// A quiz must contain at least one question.
    #[error("A quiz must contain at least one question")]
    EmptyQuiz,

    /// Provider returned a quiz that violates the question contract.
    #[error("Malformed quiz payload: {0}")]
    MalformedQuiz(String),

    /// No quiz with the given identifier exists in the library.
    #[error("Quiz not found: '{0}'")]
    QuizNotFound(String),

    // ========================================================================
    // Provider Errors
    // ========================================================================
    /// The generative provider failed.
    #[error("Provider error ({kind}): {message}")]
    Provider {
        /// The kind of provider failure.
        kind: ProviderErrorKind,
        /// Detailed message, for logs only.
        message: String,
    },

    /// The image provider answered without any image payload.
    #[error("Provider returned no image data")]
    NoImageReturned,

    // ========================================================================
    // Concurrency Errors
    // ========================================================================
    /// A request from the same origin is already outstanding.
    #[error("A {0} request is already in progress")]
    RequestInFlight(ActionOrigin),

    /// The owning view was discarded or replaced while the request was in flight.
    #[error("The {0} result was discarded because its view was replaced")]
    Superseded(ActionOrigin),

    // ========================================================================
    // View / State Machine Errors
    // ========================================================================
    /// Invalid state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },

    /// No quiz session is active.
    #[error("No quiz is being played")]
    NoActiveSession,

    /// The chat panel is not open.
    #[error("The chat panel is closed")]
    ChatClosed,

    /// No transformed image is available.
    #[error("No transformed image is available")]
    NoResultImage,

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// The task running an action ended without producing a result.
    #[error("Action task failed: {0}")]
    TaskFailed(String),
}

/// Categories of provider failures for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Authentication failure (invalid or missing API key).
    Authentication,
    /// Rate limit or quota exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// The request exceeded the configured timeout.
    Timeout,
    /// The model refused or was blocked by safety filters.
    Refused,
    /// The response could not be parsed into the expected shape.
    MalformedResponse,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::Refused => write!(f, "refused"),
            Self::MalformedResponse => write!(f, "malformed_response"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl StudioError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `Provider` error.
    #[must_use]
    pub fn provider(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self::Provider {
            kind,
            message: message.into(),
        }
    }

    /// Creates a new `MalformedQuiz` error.
    #[must_use]
    pub fn malformed_quiz(reason: impl Into<String>) -> Self {
        Self::MalformedQuiz(reason.into())
    }

    /// Creates a new `InvalidImage` error.
    #[must_use]
    pub fn invalid_image(reason: impl Into<String>) -> Self {
        Self::InvalidImage(reason.into())
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if the caller should have rejected this input locally.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::EmptyTopic
                | Self::EmptyPrompt
                | Self::MissingImage
                | Self::MissingInstruction
                | Self::InvalidImage(_)
                | Self::OptionOutOfRange { .. }
        )
    }

    /// Returns `true` if this error came from the generative provider.
    ///
    /// These surface to the user as a single generic notice.
    #[must_use]
    pub const fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::NoImageReturned | Self::MalformedQuiz(_) | Self::EmptyQuiz
        )
    }
}
