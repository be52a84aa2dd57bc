//! Gemini REST client implementing the studio provider traits.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use studio_core::{
    ChatMode, ChatProvider, Config, ImagePayload, ImageProvider, ModelConfig, QuizDraft,
    QuizProvider,
};

use crate::error::GenAiError;
use crate::protocol::{
    quiz_schema, strip_code_fence, Content, ErrorEnvelope, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, Part, ThinkingConfig, Tool,
};

const API_KEY_HEADER: &str = "x-goog-api-key";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Client for `generateContent`.
///
/// One instance serves all three providers; the model used depends on the
/// action.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    models: ModelConfig,
    search_grounding: bool,
    thinking_budget: u32,
    system_instruction: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("search_grounding", &self.search_grounding)
            .field("thinking_budget", &self.thinking_budget)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Creates a client with default settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self, GenAiError> {
        Self::from_config(&Config::default(), api_key)
    }

    /// Creates a client from the studio configuration.
    pub fn from_config(config: &Config, api_key: impl Into<String>) -> Result<Self, GenAiError> {
        let timeout = if config.request_timeout_secs == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            config.request_timeout_secs
        };
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            models: config.models.clone(),
            search_grounding: config.search_grounding,
            thinking_budget: config.thinking_budget,
            system_instruction: config.system_instruction.clone(),
        })
    }

    /// Overrides the endpoint base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the model names.
    #[must_use]
    pub fn with_models(mut self, models: ModelConfig) -> Self {
        self.models = models;
        self
    }

    /// Enables or disables web search grounding for quizzes.
    #[must_use]
    pub const fn with_search_grounding(mut self, enabled: bool) -> Self {
        self.search_grounding = enabled;
        self
    }

    /// Endpoint base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Model names.
    pub const fn models(&self) -> &ModelConfig {
        &self.models
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenAiError> {
        debug!(model = %model, "Sending generateContent request");

        let response = self
            .http
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(body);
            warn!(model = %model, status = status.as_u16(), "Gemini request failed");
            return Err(GenAiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| GenAiError::decode(e.to_string()))
    }

    fn quiz_request(&self, topic: &str, question_count: u32) -> GenerateContentRequest {
        let prompt = format!(
            "Create a comprehensive {question_count}-question multiple-choice quiz about \"{topic}\". \
             Ensure the questions are accurate, up-to-date, and challenging. \
             Include clear explanations for why the correct answer is right."
        );
        let mut request = GenerateContentRequest::user(vec![Part::text(prompt)]);
        if self.search_grounding {
            request.tools.push(Tool::google_search());
        }
        request.generation_config = Some(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(quiz_schema()),
            thinking_config: None,
        });
        request
    }

    fn chat_request(&self, prompt: &str, mode: ChatMode) -> GenerateContentRequest {
        let mut request = GenerateContentRequest::user(vec![Part::text(prompt)]);
        match mode {
            ChatMode::Direct => {
                request.system_instruction = Some(Content::instruction(&self.system_instruction));
            }
            ChatMode::ExtendedReasoning => {
                request.generation_config = Some(GenerationConfig {
                    thinking_config: Some(ThinkingConfig {
                        thinking_budget: self.thinking_budget,
                    }),
                    ..GenerationConfig::default()
                });
            }
        }
        request
    }

    async fn quiz(&self, topic: &str, question_count: u32) -> Result<QuizDraft, GenAiError> {
        let request = self.quiz_request(topic, question_count);
        let response = self.generate(&self.models.quiz, &request).await?;
        let text = response.text()?;
        let json = strip_code_fence(&text);
        if json.is_empty() {
            return Err(GenAiError::decode("quiz response contained no text"));
        }
        let draft: QuizDraft =
            serde_json::from_str(json).map_err(|e| GenAiError::decode(e.to_string()))?;
        debug!(
            topic = %topic,
            questions = draft.questions.len(),
            "Quiz draft received"
        );
        Ok(draft)
    }

    async fn image(
        &self,
        image: &ImagePayload,
        instruction: &str,
    ) -> Result<ImagePayload, GenAiError> {
        let request = GenerateContentRequest::user(vec![
            Part::inline(image.mime_type(), image.to_base64()),
            Part::text(instruction),
        ]);
        let response = self.generate(&self.models.image, &request).await?;
        let data = response.inline_data()?.ok_or(GenAiError::NoImage)?;
        let result = ImagePayload::from_base64(&data.mime_type, &data.data)
            .map_err(|e| GenAiError::decode(e.to_string()))?;
        debug!(
            mime_type = result.mime_type(),
            size = result.len(),
            "Image received"
        );
        Ok(result)
    }

    async fn chat(&self, prompt: &str, mode: ChatMode) -> Result<String, GenAiError> {
        let request = self.chat_request(prompt, mode);
        let response = self.generate(&self.models.chat, &request).await?;
        response.text()
    }
}

#[async_trait]
impl QuizProvider for GeminiClient {
    async fn generate_quiz(
        &self,
        topic: &str,
        question_count: u32,
    ) -> studio_core::Result<QuizDraft> {
        Ok(self.quiz(topic, question_count).await?)
    }
}

#[async_trait]
impl ImageProvider for GeminiClient {
    async fn transform_image(
        &self,
        image: &ImagePayload,
        instruction: &str,
    ) -> studio_core::Result<ImagePayload> {
        Ok(self.image(image, instruction).await?)
    }
}

#[async_trait]
impl ChatProvider for GeminiClient {
    async fn reply(&self, prompt: &str, mode: ChatMode) -> studio_core::Result<String> {
        Ok(self.chat(prompt, mode).await?)
    }
}
