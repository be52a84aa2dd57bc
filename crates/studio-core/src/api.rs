//! HTTP API for the studio front-end.
//!
//! # Endpoints
//!
//! - `GET /api/state` - Full view snapshot
//! - `POST /api/view` - Navigate between views
//! - `GET /api/quizzes`, `POST /api/quizzes` - List or generate quizzes
//! - `GET /api/quizzes/:id`, `POST /api/quizzes/:id/start` - Inspect or play a quiz
//! - `GET /api/session`, `POST /api/session/{select,advance,exit}` - Play the active quiz
//! - `GET /api/chat`, `POST /api/chat/{open,close,mode,messages}` - Chat panel
//! - `PUT /api/images/source`, `POST /api/images/transform`,
//!   `GET /api/images/result` - Image studio
//! - `GET /ws` - Event stream
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use studio_core::{create_router, Providers, Studio, StudioSettings};
//!
//! # async fn example(providers: Providers) {
//! let studio = Arc::new(Studio::new(providers, StudioSettings::default()));
//! let router = create_router(studio, 20 * 1024 * 1024);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::action::ActionOrigin;
use crate::chat::{ChatMessage, ChatView};
use crate::error::StudioError;
use crate::events::ws_handler;
use crate::image::{EncodedImage, ImagePayload, ImageStudioView};
use crate::quiz::{Quiz, QuizSummary};
use crate::session::{SessionOutcome, SessionView};
use crate::studio::{AppView, GeneratedQuiz, SelectionResult, Studio, StudioSnapshot};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `POST /api/view`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateRequest {
    /// Target view.
    pub view: AppView,
}

/// Response body for `POST /api/view`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateResponse {
    /// The view now shown.
    pub view: AppView,
}

/// Request body for `POST /api/quizzes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateQuizRequest {
    /// Free-text topic.
    pub topic: String,
}

/// Request body for `POST /api/session/select`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectOptionRequest {
    /// Zero-based option index.
    pub option: usize,
}

/// Request body for `POST /api/chat/mode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatModeRequest {
    /// Enable extended reasoning.
    pub extended_reasoning: bool,
}

/// Request body for `POST /api/chat/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRequest {
    /// The user's message.
    pub prompt: String,
}

/// Response body for `POST /api/chat/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageResponse {
    /// The appended model reply.
    pub message: ChatMessage,
}

/// Request body for `PUT /api/images/source`.
///
/// Accepts either a browser `data:` URL or separate base64 bytes and MIME type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceImageRequest {
    /// `data:<mime>;base64,<data>`.
    #[serde(rename_all = "camelCase")]
    DataUrl {
        /// The data URL.
        data_url: String,
    },
    /// Base64 bytes with an explicit media type.
    #[serde(rename_all = "camelCase")]
    Inline {
        /// Base64 image bytes.
        image_bytes: String,
        /// MIME type.
        mime_type: String,
    },
}

impl SourceImageRequest {
    fn decode(&self) -> crate::Result<ImagePayload> {
        match self {
            Self::DataUrl { data_url } => ImagePayload::from_data_url(data_url),
            Self::Inline {
                image_bytes,
                mime_type,
            } => ImagePayload::from_base64(mime_type, image_bytes),
        }
    }
}

/// Request body for `POST /api/images/transform`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformImageRequest {
    /// What to do to the image.
    pub instruction: String,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// API Error Type
// ============================================================================

/// Maps a [`StudioError`] to an HTTP response.
///
/// Provider failures never expose technical detail; the body carries the
/// generic notice of the action that failed.
#[derive(Debug)]
struct ApiError {
    error: StudioError,
    origin: Option<ActionOrigin>,
}

impl ApiError {
    fn action(origin: ActionOrigin) -> impl FnOnce(StudioError) -> Self {
        move |error| Self {
            error,
            origin: Some(origin),
        }
    }
}

impl From<StudioError> for ApiError {
    fn from(error: StudioError) -> Self {
        Self {
            error,
            origin: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = &self.error;
        let (status, message) = if error.is_precondition() {
            (StatusCode::BAD_REQUEST, error.to_string())
        } else if error.is_provider_failure() {
            let notice = self.origin.map_or_else(
                || "The generative service failed. Please try again.".to_string(),
                |origin| origin.failure_notice().to_string(),
            );
            (StatusCode::BAD_GATEWAY, notice)
        } else {
            match error {
                StudioError::QuizNotFound(_) | StudioError::NoResultImage => {
                    (StatusCode::NOT_FOUND, error.to_string())
                }
                StudioError::RequestInFlight(_)
                | StudioError::Superseded(_)
                | StudioError::InvalidStateTransition { .. }
                | StudioError::NoActiveSession
                | StudioError::ChatClosed => (StatusCode::CONFLICT, error.to_string()),
                _ => {
                    warn!(error = %error, "Internal error");
                    (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
                }
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints and the event stream.
///
/// Request bodies above `max_upload_bytes` are rejected with 413.
pub fn create_router(studio: Arc<Studio>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/state", get(handle_state))
        .route("/view", post(handle_navigate))
        .route("/quizzes", get(handle_list_quizzes).post(handle_generate_quiz))
        .route("/quizzes/:id", get(handle_get_quiz))
        .route("/quizzes/:id/start", post(handle_start_quiz))
        .route("/session", get(handle_session))
        .route("/session/select", post(handle_select_option))
        .route("/session/advance", post(handle_advance))
        .route("/session/exit", post(handle_exit_session))
        .route("/chat", get(handle_chat))
        .route("/chat/open", post(handle_open_chat))
        .route("/chat/close", post(handle_close_chat))
        .route("/chat/mode", post(handle_chat_mode))
        .route("/chat/messages", post(handle_send_chat))
        .route("/images/source", put(handle_set_source_image))
        .route("/images/transform", post(handle_transform_image))
        .route("/images/result", get(handle_result_image));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(studio)
}

// ============================================================================
// Handlers
// ============================================================================

async fn handle_state(State(studio): State<Arc<Studio>>) -> Json<StudioSnapshot> {
    Json(studio.snapshot().await)
}

async fn handle_navigate(
    State(studio): State<Arc<Studio>>,
    Json(request): Json<NavigateRequest>,
) -> ApiResult<NavigateResponse> {
    let view = studio.navigate(request.view).await?;
    Ok(Json(NavigateResponse { view }))
}

async fn handle_list_quizzes(State(studio): State<Arc<Studio>>) -> Json<Vec<QuizSummary>> {
    Json(studio.list_quizzes().await)
}

async fn handle_get_quiz(
    State(studio): State<Arc<Studio>>,
    Path(id): Path<String>,
) -> ApiResult<Quiz> {
    Ok(Json(studio.get_quiz(&id).await?))
}

/// Handler for `POST /api/quizzes`.
///
/// Waits for the provider; the result is also broadcast. The work still
/// completes if the client disconnects.
async fn handle_generate_quiz(
    State(studio): State<Arc<Studio>>,
    Json(request): Json<GenerateQuizRequest>,
) -> Result<(StatusCode, Json<GeneratedQuiz>), ApiError> {
    info!(topic = %request.topic, "Quiz generation requested");
    let generated = studio
        .generate_quiz(&request.topic)
        .await
        .map_err(ApiError::action(ActionOrigin::QuizGeneration))?;
    Ok((StatusCode::CREATED, Json(generated)))
}

async fn handle_start_quiz(
    State(studio): State<Arc<Studio>>,
    Path(id): Path<String>,
) -> ApiResult<SessionView> {
    Ok(Json(studio.start_quiz(&id).await?))
}

async fn handle_session(State(studio): State<Arc<Studio>>) -> ApiResult<SessionView> {
    Ok(Json(studio.session().await?))
}

async fn handle_select_option(
    State(studio): State<Arc<Studio>>,
    Json(request): Json<SelectOptionRequest>,
) -> ApiResult<SelectionResult> {
    Ok(Json(studio.select_option(request.option).await?))
}

async fn handle_advance(State(studio): State<Arc<Studio>>) -> ApiResult<SessionView> {
    Ok(Json(studio.advance().await?))
}

async fn handle_exit_session(State(studio): State<Arc<Studio>>) -> ApiResult<SessionOutcome> {
    Ok(Json(studio.exit_session().await?))
}

async fn handle_chat(State(studio): State<Arc<Studio>>) -> Json<ChatView> {
    Json(studio.chat().await)
}

async fn handle_open_chat(State(studio): State<Arc<Studio>>) -> Json<ChatView> {
    Json(studio.open_chat().await)
}

async fn handle_close_chat(State(studio): State<Arc<Studio>>) -> Json<ChatView> {
    studio.close_chat().await;
    Json(studio.chat().await)
}

async fn handle_chat_mode(
    State(studio): State<Arc<Studio>>,
    Json(request): Json<ChatModeRequest>,
) -> ApiResult<ChatView> {
    Ok(Json(studio.set_chat_mode(request.extended_reasoning).await?))
}

async fn handle_send_chat(
    State(studio): State<Arc<Studio>>,
    Json(request): Json<ChatMessageRequest>,
) -> ApiResult<ChatMessageResponse> {
    let message = studio
        .send_chat(&request.prompt)
        .await
        .map_err(ApiError::action(ActionOrigin::ChatSend))?;
    Ok(Json(ChatMessageResponse { message }))
}

async fn handle_set_source_image(
    State(studio): State<Arc<Studio>>,
    Json(request): Json<SourceImageRequest>,
) -> ApiResult<ImageStudioView> {
    let image = request.decode()?;
    Ok(Json(studio.set_source_image(image).await))
}

async fn handle_transform_image(
    State(studio): State<Arc<Studio>>,
    Json(request): Json<TransformImageRequest>,
) -> ApiResult<EncodedImage> {
    let image = studio
        .transform_image(&request.instruction)
        .await
        .map_err(ApiError::action(ActionOrigin::ImageTransform))?;
    Ok(Json(image))
}

async fn handle_result_image(State(studio): State<Arc<Studio>>) -> ApiResult<EncodedImage> {
    Ok(Json(studio.result_image().await?))
}

// ============================================================================
// Tests
// ============================================================================
