//! Gemini REST client for Gemini Studio.
//!
//! [`GeminiClient`] implements the quiz, image and chat provider traits from
//! `studio_core` on top of the `generateContent` endpoint.
//!
//! ```no_run
//! use std::sync::Arc;
//! use studio_core::{Config, Providers};
//! use studio_genai::GeminiClient;
//!
//! let config = Config::default();
//! let client = GeminiClient::from_config(&config, "my-api-key").unwrap();
//! let providers = Providers::shared(Arc::new(client));
//! ```

pub mod client;
pub mod error;
pub mod protocol;

pub use client::GeminiClient;
pub use error::GenAiError;
