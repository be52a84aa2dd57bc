//! Gemini Studio core
//!
//! Quiz session state machine, application controller, HTTP API and
//! WebSocket events. Generative calls go through the traits in [`provider`].

pub mod action;
pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod image;
pub mod provider;
pub mod quiz;
pub mod session;
pub mod studio;

pub use action::{ActionOrigin, BusyFlags, InFlight, InFlightGuard};
pub use api::{
    create_router, ChatMessageRequest, ChatMessageResponse, ChatModeRequest, ErrorResponse,
    GenerateQuizRequest, NavigateRequest, NavigateResponse, SelectOptionRequest,
    SourceImageRequest, TransformImageRequest,
};
pub use chat::{ChatMessage, ChatMode, ChatPanel, ChatRole, ChatTranscript, ChatView};
pub use config::{Config, MalformedQuestionPolicy, ModelConfig, CONFIG_FILE_NAME};
pub use error::{ProviderErrorKind, Result, StudioError};
pub use events::{EventBroadcaster, StudioEvent};
pub use image::{EncodedImage, ImageFormat, ImagePayload, ImageStudio, ImageStudioView};
pub use provider::{ChatProvider, ImageProvider, QuizProvider};
pub use quiz::{QuestionDraft, Question, Quiz, QuizDraft, QuizSummary, OPTIONS_PER_QUESTION};
pub use session::{QuizSession, Selection, SessionOutcome, SessionState, SessionView};
pub use studio::{
    AppView, GeneratedQuiz, Providers, SelectionResult, Studio, StudioSettings, StudioSnapshot,
};
