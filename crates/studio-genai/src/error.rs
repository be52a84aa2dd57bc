//! Errors raised by the Gemini client.

use studio_core::{ProviderErrorKind, StudioError};

/// Transport and protocol failures talking to the Gemini API.
#[derive(Debug, thiserror::Error)]
pub enum GenAiError {
    /// The HTTP request could not be completed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("Gemini API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The prompt or the answer was blocked.
    #[error("Response blocked: {0}")]
    Blocked(String),

    /// The response did not have the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The image model answered without an image.
    #[error("No image data returned from model")]
    NoImage,
}

impl GenAiError {
    /// Creates a new `Decode` error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Classifies the failure.
    #[must_use]
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Http(e) if e.is_timeout() => ProviderErrorKind::Timeout,
            Self::Http(e) if e.is_decode() => ProviderErrorKind::MalformedResponse,
            Self::Http(_) => ProviderErrorKind::Network,
            Self::Api { status, .. } => match status {
                401 | 403 => ProviderErrorKind::Authentication,
                429 => ProviderErrorKind::RateLimit,
                500..=599 => ProviderErrorKind::Server,
                _ => ProviderErrorKind::Other,
            },
            Self::Blocked(_) => ProviderErrorKind::Refused,
            Self::Decode(_) | Self::NoImage => ProviderErrorKind::MalformedResponse,
        }
    }
}

impl From<GenAiError> for StudioError {
    fn from(err: GenAiError) -> Self {
        match err {
            GenAiError::NoImage => Self::NoImageReturned,
            other => Self::provider(other.kind(), other.to_string()),
        }
    }
}
