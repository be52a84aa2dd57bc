//! Integration tests for WebSocket event streaming.
//!
//! These tests validate that studio actions are broadcast to every
//! connected client in the order they happen.

mod common;

use std::time::Duration;

use common::{spawn_scripted, ScriptedProvider};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use studio_core::{ActionOrigin, AppView, ProviderErrorKind, StudioError, StudioEvent};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::Message;

/// Helper type for WebSocket client
type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects a client and consumes the initial `connected` event.
async fn connect_client(url: &str) -> (WsClient, StudioEvent) {
    let (mut ws_stream, _) = connect_async(url)
        .await
        .expect("Failed to connect to WebSocket");
    let connected = receive_event(&mut ws_stream).await;
    (ws_stream, connected)
}

/// Receives the next text message and parses it as a `StudioEvent`.
/// Answers pings along the way.
async fn receive_event(client: &mut WsClient) -> StudioEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            Message::Pong(_) => {}
            other => panic!("Expected text message, got: {other:?}"),
        }
    }
}

/// Asserts that no event arrives within a short window.
async fn assert_silent(client: &mut WsClient) {
    let result = timeout(Duration::from_millis(200), client.next()).await;
    assert!(result.is_err(), "unexpected message: {result:?}");
}

// ============================================================================
// Connection Tests
// ============================================================================

#[tokio::test]
async fn test_client_receives_snapshot_on_connect() {
    let (server, _provider) = spawn_scripted(ScriptedProvider::default()).await;

    let (_client, event) = connect_client(&server.ws_url).await;

    match event {
        StudioEvent::Connected(payload) => {
            assert_eq!(payload.snapshot.view, AppView::Home);
            assert!(payload.snapshot.quizzes.is_empty());
            assert!(payload.snapshot.session.is_none());
            assert!(!payload.snapshot.chat.open);
        }
        other => panic!("Expected Connected event, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_snapshot_reflects_existing_library() {
    let (server, _provider) = spawn_scripted(ScriptedProvider::default()).await;
    server.post("/quizzes", json!({ "topic": "planets" })).await;

    let (_client, event) = connect_client(&server.ws_url).await;

    let StudioEvent::Connected(payload) = event else {
        panic!("Expected Connected event, got: {event:?}");
    };
    assert_eq!(payload.snapshot.view, AppView::PlayQuiz);
    assert_eq!(payload.snapshot.quizzes.len(), 1);
    assert!(payload.snapshot.session.is_some());
}

// ============================================================================
// Event Broadcasting Tests
// ============================================================================

#[tokio::test]
async fn test_quiz_play_events_in_order() {
    let (server, _provider) = spawn_scripted(ScriptedProvider::default()).await;
    let (mut client, _) = connect_client(&server.ws_url).await;

    server.post("/quizzes", json!({ "topic": "planets" })).await;

    match receive_event(&mut client).await {
        StudioEvent::QuizGenerated(payload) => {
            assert!(payload.opened);
            assert_eq!(payload.quiz.title, "Planets");
        }
        other => panic!("Expected QuizGenerated, got: {other:?}"),
    }
    match receive_event(&mut client).await {
        StudioEvent::ViewChanged(payload) => assert_eq!(payload.view, AppView::PlayQuiz),
        other => panic!("Expected ViewChanged, got: {other:?}"),
    }

    server.post("/session/select", json!({ "option": 1 })).await;
    match receive_event(&mut client).await {
        StudioEvent::AnswerRecorded(payload) => {
            assert_eq!(payload.question_index, 0);
            assert_eq!(payload.selected, 1);
            assert!(payload.correct);
            assert_eq!(payload.score, 1);
        }
        other => panic!("Expected AnswerRecorded, got: {other:?}"),
    }

    // Ignored selection is not broadcast
    server.post("/session/select", json!({ "option": 2 })).await;
    assert_silent(&mut client).await;

    server.post("/session/advance", json!({})).await;
    server.post("/session/select", json!({ "option": 2 })).await;
    match receive_event(&mut client).await {
        StudioEvent::AnswerRecorded(payload) => {
            assert_eq!(payload.question_index, 1);
            assert_eq!(payload.score, 2);
        }
        other => panic!("Expected AnswerRecorded, got: {other:?}"),
    }

    server.post("/session/advance", json!({})).await;
    match receive_event(&mut client).await {
        StudioEvent::QuizFinished(payload) => {
            assert_eq!(payload.score, 2);
            assert_eq!(payload.total, 2);
        }
        other => panic!("Expected QuizFinished, got: {other:?}"),
    }

    server.post("/session/exit", json!({})).await;
    match receive_event(&mut client).await {
        StudioEvent::ViewChanged(payload) => assert_eq!(payload.view, AppView::Home),
        other => panic!("Expected ViewChanged, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_failure_broadcasts_action_failed() {
    let provider = ScriptedProvider::default();
    provider.push_quiz(Err(StudioError::provider(
        ProviderErrorKind::Timeout,
        "deadline exceeded",
    )));
    let (server, _provider) = spawn_scripted(provider).await;
    let (mut client, _) = connect_client(&server.ws_url).await;

    server.post("/quizzes", json!({ "topic": "planets" })).await;

    match receive_event(&mut client).await {
        StudioEvent::ActionFailed(payload) => {
            assert_eq!(payload.origin, ActionOrigin::QuizGeneration);
            assert_eq!(
                payload.notice,
                "Failed to generate quiz. Gemini might be busy or the topic was too obscure."
            );
        }
        other => panic!("Expected ActionFailed, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_precondition_failures_are_not_broadcast() {
    let (server, _provider) = spawn_scripted(ScriptedProvider::default()).await;
    let (mut client, _) = connect_client(&server.ws_url).await;

    server.post("/quizzes", json!({ "topic": "" })).await;

    assert_silent(&mut client).await;
}

#[tokio::test]
async fn test_chat_and_image_events() {
    let (server, _provider) = spawn_scripted(ScriptedProvider::default()).await;
    let (mut client, _) = connect_client(&server.ws_url).await;

    server.post("/chat/open", json!({})).await;
    server.post("/chat/messages", json!({ "prompt": "hello" })).await;
    match receive_event(&mut client).await {
        StudioEvent::ChatReply(payload) => {
            assert_eq!(payload.message.content, "echo: hello");
            assert!(!payload.message.is_thinking);
        }
        other => panic!("Expected ChatReply, got: {other:?}"),
    }

    server.post("/view", json!({ "view": "image-studio" })).await;
    match receive_event(&mut client).await {
        StudioEvent::ViewChanged(payload) => assert_eq!(payload.view, AppView::ImageStudio),
        other => panic!("Expected ViewChanged, got: {other:?}"),
    }

    server
        .put(
            "/images/source",
            json!({ "dataUrl": common::png().to_data_url() }),
        )
        .await;
    server
        .post("/images/transform", json!({ "instruction": "add a hat" }))
        .await;
    match receive_event(&mut client).await {
        StudioEvent::ImageReady(payload) => {
            assert_eq!(payload.mime_type, "image/png");
            assert_eq!(payload.size, 4);
        }
        other => panic!("Expected ImageReady, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_multiple_clients_receive_same_events() {
    let (server, _provider) = spawn_scripted(ScriptedProvider::default()).await;
    let (mut first, _) = connect_client(&server.ws_url).await;
    let (mut second, _) = connect_client(&server.ws_url).await;

    server.post("/view", json!({ "view": "image-studio" })).await;

    for client in [&mut first, &mut second] {
        match receive_event(client).await {
            StudioEvent::ViewChanged(payload) => assert_eq!(payload.view, AppView::ImageStudio),
            other => panic!("Expected ViewChanged, got: {other:?}"),
        }
    }
}
