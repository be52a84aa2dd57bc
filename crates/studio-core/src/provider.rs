//! Generative provider seams.
//!
//! The studio never talks to a model directly. Each action goes through one of
//! these traits so the HTTP client can be swapped for a fake in tests.

use async_trait::async_trait;

use crate::chat::ChatMode;
use crate::error::Result;
use crate::image::ImagePayload;
use crate::quiz::QuizDraft;

/// Produces a quiz for a topic.
#[async_trait]
pub trait QuizProvider: Send + Sync {
    /// Requests `question_count` questions about `topic`.
    ///
    /// The draft is returned as parsed; validation happens in the caller.
    async fn generate_quiz(&self, topic: &str, question_count: u32) -> Result<QuizDraft>;
}

/// Transforms an image according to a natural-language instruction.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Returns the transformed image.
    ///
    /// A response without image data must surface as
    /// `StudioError::NoImageReturned`.
    async fn transform_image(&self, image: &ImagePayload, instruction: &str)
        -> Result<ImagePayload>;
}

/// Answers a single chat prompt.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Returns the reply text for `prompt`. Only the latest turn is sent.
    async fn reply(&self, prompt: &str, mode: ChatMode) -> Result<String>;
}
