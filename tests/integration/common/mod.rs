//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use studio_core::{
    create_router, ChatMode, ChatProvider, ImageFormat, ImagePayload, ImageProvider, Providers,
    QuestionDraft, QuizDraft, QuizProvider, Studio, StudioSettings,
};
use tokio::sync::Semaphore;

/// Provider with scripted answers. Empty queues fall back to canned answers.
#[derive(Default)]
pub struct ScriptedProvider {
    pub quizzes: Mutex<VecDeque<studio_core::Result<QuizDraft>>>,
    pub replies: Mutex<VecDeque<studio_core::Result<String>>>,
    pub images: Mutex<VecDeque<studio_core::Result<ImagePayload>>>,
    pub chat_gate: Option<Arc<Semaphore>>,
    pub quiz_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn with_chat_gate(gate: Arc<Semaphore>) -> Self {
        Self {
            chat_gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn push_quiz(&self, result: studio_core::Result<QuizDraft>) {
        self.quizzes.lock().unwrap().push_back(result);
    }

    pub fn push_reply(&self, result: studio_core::Result<String>) {
        self.replies.lock().unwrap().push_back(result);
    }

    pub fn push_image(&self, result: studio_core::Result<ImagePayload>) {
        self.images.lock().unwrap().push_back(result);
    }

    pub fn quiz_calls(&self) -> usize {
        self.quiz_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuizProvider for ScriptedProvider {
    async fn generate_quiz(
        &self,
        _topic: &str,
        _question_count: u32,
    ) -> studio_core::Result<QuizDraft> {
        self.quiz_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.quizzes.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(planets_draft()))
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn reply(&self, prompt: &str, _mode: ChatMode) -> studio_core::Result<String> {
        if let Some(gate) = &self.chat_gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }
        let scripted = self.replies.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(format!("echo: {prompt}")))
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    async fn transform_image(
        &self,
        image: &ImagePayload,
        _instruction: &str,
    ) -> studio_core::Result<ImagePayload> {
        let scripted = self.images.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(image.clone()))
    }
}

/// Two questions; the correct answers are options 1 and 2.
pub fn planets_draft() -> QuizDraft {
    let options = || {
        vec![
            "Venus".to_string(),
            "Mars".to_string(),
            "Jupiter".to_string(),
            "Saturn".to_string(),
        ]
    };
    QuizDraft {
        title: "Planets".to_string(),
        questions: vec![
            QuestionDraft {
                text: "Which planet is known as the red planet?".to_string(),
                options: options(),
                correct_index: 1,
                explanation: "Iron oxide gives Mars its color.".to_string(),
            },
            QuestionDraft {
                text: "Which planet is the largest?".to_string(),
                options: options(),
                correct_index: 2,
                explanation: "Jupiter is more than twice as massive as the rest combined."
                    .to_string(),
            },
        ],
    }
}

pub fn png() -> ImagePayload {
    ImagePayload::new(ImageFormat::Png, vec![0x89, b'P', b'N', b'G']).unwrap()
}

/// A running server on an ephemeral port.
pub struct TestServer {
    pub base_url: String,
    pub ws_url: String,
    pub studio: Arc<Studio>,
    pub http: reqwest::Client,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn get(&self, path: &str) -> (reqwest::StatusCode, Value) {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .expect("request failed");
        decode(response).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (reqwest::StatusCode, Value) {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("request failed");
        decode(response).await
    }

    pub async fn put(&self, path: &str, body: Value) -> (reqwest::StatusCode, Value) {
        let response = self
            .http
            .put(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("request failed");
        decode(response).await
    }
}

async fn decode(response: reqwest::Response) -> (reqwest::StatusCode, Value) {
    let status = response.status();
    let text = response.text().await.expect("body");
    let value = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).expect("json body")
    };
    (status, value)
}

/// Spawns the studio router with the given providers.
pub async fn spawn_server(providers: Providers) -> TestServer {
    let studio = Arc::new(Studio::new(providers, StudioSettings::default()));
    let router = create_router(Arc::clone(&studio), 1024 * 1024);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        base_url: format!("http://{addr}/api"),
        ws_url: format!("ws://{addr}/ws"),
        studio,
        http: reqwest::Client::new(),
        _handle: handle,
    }
}

/// Spawns a server backed by a scripted provider.
pub async fn spawn_scripted(provider: ScriptedProvider) -> (TestServer, Arc<ScriptedProvider>) {
    let provider = Arc::new(provider);
    let server = spawn_server(Providers::shared(Arc::clone(&provider))).await;
    (server, provider)
}
