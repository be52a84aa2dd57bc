//! WebSocket event stream.
//!
//! Every committed action is broadcast to connected clients so the
//! presentation layer can re-render without polling. Events are JSON objects
//! of the form `{ "event": <name>, "payload": {...} }`.
//!
//! # Event Types
//!
//! - `connected` - sent once per client with the current snapshot
//! - `view_changed` - the top-level view switched
//! - `quiz_generated` - a quiz joined the library
//! - `answer_recorded` / `quiz_finished` - session progress
//! - `chat_reply` - a model message was appended
//! - `image_ready` - a transformed image is available
//! - `action_failed` - a provider call failed; carries the user notice
//! - `result_discarded` - a late result was dropped because its view is gone

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::action::ActionOrigin;
use crate::chat::ChatMessage;
use crate::quiz::QuizSummary;
use crate::studio::{AppView, Studio, StudioSnapshot};

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// The current snapshot.
    pub snapshot: StudioSnapshot,
}

/// Payload for the `view_changed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewChangedPayload {
    /// The new view.
    pub view: AppView,
}

/// Payload for the `quiz_generated` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizGeneratedPayload {
    /// The new library entry.
    pub quiz: QuizSummary,
    /// Whether the quiz was opened for play.
    pub opened: bool,
}

/// Payload for the `answer_recorded` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecordedPayload {
    /// Zero-based question index.
    pub question_index: usize,
    /// The recorded option.
    pub selected: usize,
    /// Whether it was correct.
    pub correct: bool,
    /// Score after the answer.
    pub score: usize,
}

/// Payload for the `quiz_finished` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizFinishedPayload {
    /// Final score.
    pub score: usize,
    /// Number of questions.
    pub total: usize,
}

/// Payload for the `chat_reply` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReplyPayload {
    /// The appended model message.
    pub message: ChatMessage,
}

/// Payload for the `image_ready` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReadyPayload {
    /// MIME type of the result.
    pub mime_type: String,
    /// Size in bytes.
    pub size: usize,
}

/// Payload for the `action_failed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionFailedPayload {
    /// The failed action.
    pub origin: ActionOrigin,
    /// Generic notice to show the user.
    pub notice: String,
}

/// Payload for the `result_discarded` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultDiscardedPayload {
    /// The action whose result was dropped.
    pub origin: ActionOrigin,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Events pushed to WebSocket clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum StudioEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// The top-level view switched.
    ViewChanged(ViewChangedPayload),
    /// A quiz joined the library.
    QuizGenerated(QuizGeneratedPayload),
    /// An answer was recorded.
    AnswerRecorded(AnswerRecordedPayload),
    /// The last question was reviewed.
    QuizFinished(QuizFinishedPayload),
    /// A model message was appended to the chat.
    ChatReply(ChatReplyPayload),
    /// A transformed image is available.
    ImageReady(ImageReadyPayload),
    /// A provider call failed.
    ActionFailed(ActionFailedPayload),
    /// A late result was dropped.
    ResultDiscarded(ResultDiscardedPayload),
}

impl StudioEvent {
    /// Creates a `Connected` event.
    #[must_use]
    pub const fn connected(snapshot: StudioSnapshot) -> Self {
        Self::Connected(ConnectedPayload { snapshot })
    }

    /// Creates a `ViewChanged` event.
    #[must_use]
    pub const fn view_changed(view: AppView) -> Self {
        Self::ViewChanged(ViewChangedPayload { view })
    }

    /// Creates a `QuizGenerated` event.
    #[must_use]
    pub const fn quiz_generated(quiz: QuizSummary, opened: bool) -> Self {
        Self::QuizGenerated(QuizGeneratedPayload { quiz, opened })
    }

    /// Creates an `AnswerRecorded` event.
    #[must_use]
    pub const fn answer_recorded(
        question_index: usize,
        selected: usize,
        correct: bool,
        score: usize,
    ) -> Self {
        Self::AnswerRecorded(AnswerRecordedPayload {
            question_index,
            selected,
            correct,
            score,
        })
    }

    /// Creates a `QuizFinished` event.
    #[must_use]
    pub const fn quiz_finished(score: usize, total: usize) -> Self {
        Self::QuizFinished(QuizFinishedPayload { score, total })
    }

    /// Creates a `ChatReply` event.
    #[must_use]
    pub const fn chat_reply(message: ChatMessage) -> Self {
        Self::ChatReply(ChatReplyPayload { message })
    }

    /// Creates an `ImageReady` event.
    #[must_use]
    pub fn image_ready(mime_type: impl Into<String>, size: usize) -> Self {
        Self::ImageReady(ImageReadyPayload {
            mime_type: mime_type.into(),
            size,
        })
    }

    /// Creates an `ActionFailed` event with the origin's generic notice.
    #[must_use]
    pub fn action_failed(origin: ActionOrigin) -> Self {
        Self::ActionFailed(ActionFailedPayload {
            origin,
            notice: origin.failure_notice().to_string(),
        })
    }

    /// Creates a `ResultDiscarded` event.
    #[must_use]
    pub const fn result_discarded(origin: ActionOrigin) -> Self {
        Self::ResultDiscarded(ResultDiscardedPayload { origin })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::ViewChanged(_) => "view_changed",
            Self::QuizGenerated(_) => "quiz_generated",
            Self::AnswerRecorded(_) => "answer_recorded",
            Self::QuizFinished(_) => "quiz_finished",
            Self::ChatReply(_) => "chat_reply",
            Self::ImageReady(_) => "image_ready",
            Self::ActionFailed(_) => "action_failed",
            Self::ResultDiscarded(_) => "result_discarded",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Broadcasts studio events to all connected WebSocket clients.
///
/// Events are not persisted for disconnected clients.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<StudioEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls behind receives a `Lagged` error and misses
    /// events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event, returning the number of receivers.
    pub fn send(&self, event: StudioEvent) -> usize {
        // Err only means nobody is listening.
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Interval between heartbeat pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// WebSocket upgrade handler for `/ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(studio): State<Arc<Studio>>) -> Response {
    info!("New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, studio))
}

/// Handles a single WebSocket connection.
///
/// Subscribes before taking the snapshot so no commit falls between the two.
async fn handle_socket(socket: WebSocket, studio: Arc<Studio>) {
    let (mut sender, mut receiver) = socket.split();
    let mut event_receiver = studio.events().subscribe();

    let connected = StudioEvent::connected(studio.snapshot().await);
    let connected_json = match serde_json::to_string(&connected) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize connected event: {}", e);
            return;
        }
    };

    if sender.send(Message::Text(connected_json)).await.is_err() {
        debug!("Client disconnected before receiving connected event");
        return;
    }

    info!("WebSocket client connected, sent snapshot");

    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    // The first tick completes immediately.
    heartbeat.tick().await;
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                        debug!("Received pong from client");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client requested close");
                        break;
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        debug!("Ignoring data message from client");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!("Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }

            event = event_receiver.recv() => {
                match event {
                    Ok(studio_event) => {
                        let json = match serde_json::to_string(&studio_event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };

                        if sender.send(Message::Text(json)).await.is_err() {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client lagged, missed {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcaster closed");
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    debug!("Failed to send ping, client disconnected");
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!("Client missed {} pongs, closing connection", MAX_MISSED_PONGS);
                    break;
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

// ============================================================================
// Tests
// ============================================================================
