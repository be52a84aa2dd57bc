//! Integration tests for the studio HTTP API.
//!
//! These tests run the full router on a real socket with a scripted provider
//! and drive quiz play, chat and image editing through HTTP.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{planets_draft, png, spawn_scripted, ScriptedProvider};
use reqwest::StatusCode;
use serde_json::json;
use studio_core::{ImageFormat, ImagePayload, ProviderErrorKind, StudioError};
use tokio::sync::Semaphore;

// ============================================================================
// Quiz Flow
// ============================================================================

/// Plays a generated quiz to the end and returns to the library.
#[tokio::test]
async fn test_generate_and_play_quiz_to_completion() {
    let (server, provider) = spawn_scripted(ScriptedProvider::default()).await;

    let (status, generated) = server
        .post("/quizzes", json!({ "topic": "  planets  " }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(generated["opened"], true);
    assert_eq!(generated["quiz"]["topic"], "planets");
    assert_eq!(generated["quiz"]["questionCount"], 2);
    assert_eq!(provider.quiz_calls(), 1);

    let (_, state) = server.get("/state").await;
    assert_eq!(state["view"], "play-quiz");
    assert_eq!(state["session"]["state"], json!({ "state": "answering", "index": 0 }));

    // Correct answer on the first question
    let (status, selection) = server.post("/session/select", json!({ "option": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(selection["recorded"], true);
    assert_eq!(selection["correct"], true);
    assert_eq!(selection["session"]["score"], 1);
    assert_eq!(selection["session"]["question"]["correctIndex"], 1);

    // A second click while reviewing is ignored
    let (status, selection) = server.post("/session/select", json!({ "option": 0 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(selection["recorded"], false);
    assert_eq!(selection["session"]["score"], 1);

    let (status, session) = server.post("/session/advance", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["state"], json!({ "state": "answering", "index": 1 }));

    // Wrong answer on the last question
    let (_, selection) = server.post("/session/select", json!({ "option": 0 })).await;
    assert_eq!(selection["correct"], false);

    let (_, session) = server.post("/session/advance", json!({})).await;
    assert_eq!(session["state"], json!({ "state": "finished", "score": 1 }));
    assert_eq!(session["questionsAnswered"], 2);

    let (status, outcome) = server.post("/session/exit", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["finished"], true);
    assert_eq!(outcome["score"], 1);

    let (_, state) = server.get("/state").await;
    assert_eq!(state["view"], "home");
    assert!(state["session"].is_null());
    assert_eq!(state["quizzes"].as_array().unwrap().len(), 1);
}

/// Tests that a quiz from the library can be replayed from scratch.
#[tokio::test]
async fn test_replay_quiz_from_library() {
    let (server, _provider) = spawn_scripted(ScriptedProvider::default()).await;

    let (_, generated) = server.post("/quizzes", json!({ "topic": "planets" })).await;
    let id = generated["quiz"]["id"].as_str().unwrap().to_string();
    server.post("/session/select", json!({ "option": 1 })).await;
    server.post("/session/exit", json!({})).await;

    let (status, session) = server.post(&format!("/quizzes/{id}/start"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["score"], 0);
    assert_eq!(session["state"], json!({ "state": "answering", "index": 0 }));

    let (status, quiz) = server.get(&format!("/quizzes/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quiz["questions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_blank_topic_is_rejected_without_calling_provider() {
    let (server, provider) = spawn_scripted(ScriptedProvider::default()).await;

    let (status, body) = server.post("/quizzes", json!({ "topic": "   " })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().to_lowercase().contains("topic"));
    assert_eq!(provider.quiz_calls(), 0);
}

#[tokio::test]
async fn test_provider_failure_returns_generic_notice() {
    let provider = ScriptedProvider::default();
    provider.push_quiz(Err(StudioError::provider(
        ProviderErrorKind::Server,
        "HTTP 503: overloaded",
    )));
    let (server, _provider) = spawn_scripted(provider).await;

    let (status, body) = server.post("/quizzes", json!({ "topic": "planets" })).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        body["error"],
        "Failed to generate quiz. Gemini might be busy or the topic was too obscure."
    );

    let (_, state) = server.get("/state").await;
    assert_eq!(state["view"], "home");
    assert_eq!(state["quizzes"].as_array().unwrap().len(), 0);
    assert_eq!(state["busy"]["quizGeneration"], false);
}

#[tokio::test]
async fn test_malformed_quiz_is_rejected() {
    let provider = ScriptedProvider::default();
    let mut draft = planets_draft();
    draft.questions[1].correct_index = 7;
    provider.push_quiz(Ok(draft));
    let (server, _provider) = spawn_scripted(provider).await;

    let (status, _) = server.post("/quizzes", json!({ "topic": "planets" })).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let (_, quizzes) = server.get("/quizzes").await;
    assert_eq!(quizzes.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_session_routes_without_session() {
    let (server, _provider) = spawn_scripted(ScriptedProvider::default()).await;

    let (status, _) = server.get("/session").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = server.post("/session/advance", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = server.get("/quizzes/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_navigation_rules() {
    let (server, _provider) = spawn_scripted(ScriptedProvider::default()).await;

    let (status, _) = server.post("/view", json!({ "view": "play-quiz" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = server.post("/view", json!({ "view": "image-studio" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["view"], "image-studio");

    let (status, body) = server.post("/view", json!({ "view": "home" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["view"], "home");
}

// ============================================================================
// Chat
// ============================================================================

#[tokio::test]
async fn test_chat_round_trip() {
    let (server, _provider) = spawn_scripted(ScriptedProvider::default()).await;

    let (status, _) = server.post("/chat/messages", json!({ "prompt": "hi" })).await;
    assert_eq!(status, StatusCode::CONFLICT, "chat is closed by default");

    let (_, chat) = server.post("/chat/open", json!({})).await;
    assert_eq!(chat["open"], true);

    let (status, body) = server.post("/chat/messages", json!({ "prompt": "hi" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["role"], "model");
    assert_eq!(body["message"]["content"], "echo: hi");

    let (_, chat) = server.post("/chat/mode", json!({ "extendedReasoning": true })).await;
    assert_eq!(chat["extendedReasoning"], true);

    let (_, body) = server.post("/chat/messages", json!({ "prompt": "why?" })).await;
    assert_eq!(body["message"]["isThinking"], true);

    let (_, chat) = server.get("/chat").await;
    let roles: Vec<_> = chat["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(roles, vec!["user", "model", "user", "model"]);

    let (_, chat) = server.post("/chat/close", json!({})).await;
    assert_eq!(chat["open"], false);
}

#[tokio::test]
async fn test_chat_failure_appends_apology() {
    let provider = ScriptedProvider::default();
    provider.push_reply(Err(StudioError::provider(
        ProviderErrorKind::RateLimit,
        "quota exceeded",
    )));
    let (server, _provider) = spawn_scripted(provider).await;
    server.post("/chat/open", json!({})).await;

    let (status, body) = server.post("/chat/messages", json!({ "prompt": "hi" })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Sorry, I encountered an error. Please try again.");

    let (_, chat) = server.get("/chat").await;
    let messages = chat["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(
        messages[1]["content"],
        "Sorry, I encountered an error. Please try again."
    );
}

/// Tests that a second send while a reply is outstanding is refused.
#[tokio::test]
async fn test_second_chat_send_is_refused_while_waiting() {
    let gate = Arc::new(Semaphore::new(0));
    let (server, _provider) =
        spawn_scripted(ScriptedProvider::with_chat_gate(Arc::clone(&gate))).await;
    server.post("/chat/open", json!({})).await;

    let url = format!("{}/chat/messages", server.base_url);
    let http = server.http.clone();
    let first = tokio::spawn(async move {
        http.post(url)
            .json(&json!({ "prompt": "first" }))
            .send()
            .await
            .expect("request failed")
            .status()
    });

    // Wait for the first send to become outstanding
    let mut waiting = false;
    for _ in 0..100 {
        let (_, state) = server.get("/state").await;
        if state["busy"]["chatSend"] == true {
            waiting = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(waiting, "first send never became outstanding");

    let (status, _) = server.post("/chat/messages", json!({ "prompt": "second" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    gate.add_permits(1);
    assert_eq!(first.await.unwrap(), StatusCode::OK);

    let (_, chat) = server.get("/chat").await;
    assert_eq!(chat["messages"].as_array().unwrap().len(), 2);
    assert_eq!(chat["waiting"], false);
}

// ============================================================================
// Image Studio
// ============================================================================

#[tokio::test]
async fn test_image_upload_and_transform() {
    let provider = ScriptedProvider::default();
    let edited = ImagePayload::new(ImageFormat::Jpeg, vec![0xff, 0xd8, 0xff, 0xe0]).unwrap();
    provider.push_image(Ok(edited));
    let (server, _provider) = spawn_scripted(provider).await;
    server.post("/view", json!({ "view": "image-studio" })).await;

    let (status, _) = server
        .post("/images/transform", json!({ "instruction": "add a hat" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "no source image yet");

    let (status, view) = server
        .put("/images/source", json!({ "dataUrl": png().to_data_url() }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["source"]["mimeType"], "image/png");
    assert_eq!(view["source"]["size"], 4);

    let (status, _) = server
        .post("/images/transform", json!({ "instruction": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "blank instruction");

    let (status, image) = server
        .post("/images/transform", json!({ "instruction": "add a hat" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(image["mimeType"], "image/jpeg");
    assert!(image["dataUrl"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));

    let (status, result) = server.get("/images/result").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result, image);
}

#[tokio::test]
async fn test_image_without_result_reports_notice() {
    let provider = ScriptedProvider::default();
    provider.push_image(Err(StudioError::NoImageReturned));
    let (server, _provider) = spawn_scripted(provider).await;
    server.post("/view", json!({ "view": "image-studio" })).await;
    server
        .put(
            "/images/source",
            json!({ "imageBytes": png().to_base64(), "mimeType": "image/png" }),
        )
        .await;

    let (status, body) = server
        .post("/images/transform", json!({ "instruction": "add a hat" }))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Failed to edit image. Try a clearer prompt.");

    let (status, _) = server.get("/images/result").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_leaving_image_studio_clears_images() {
    let (server, _provider) = spawn_scripted(ScriptedProvider::default()).await;
    server.post("/view", json!({ "view": "image-studio" })).await;
    server
        .put("/images/source", json!({ "dataUrl": png().to_data_url() }))
        .await;
    server
        .post("/images/transform", json!({ "instruction": "add a hat" }))
        .await;

    server.post("/view", json!({ "view": "home" })).await;

    let (_, state) = server.get("/state").await;
    assert!(state["images"]["source"].is_null());
    assert!(state["images"]["result"].is_null());
}

#[tokio::test]
async fn test_invalid_upload_is_rejected() {
    let (server, _provider) = spawn_scripted(ScriptedProvider::default()).await;

    let (status, _) = server
        .put("/images/source", json!({ "dataUrl": "data:text/plain;base64,aGk=" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
