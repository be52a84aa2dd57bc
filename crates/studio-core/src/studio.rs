//! The top-level application controller.
//!
//! [`Studio`] owns all view state behind one mutex. Provider calls are never
//! made while the lock is held: each action checks its preconditions, marks
//! its origin busy, captures the owning view's generation token and releases
//! the lock. The provider call and the commit then run on a spawned task that
//! owns the busy guard, so a caller that stops waiting does not cancel them.
//! The commit re-locks and applies the result only if the token is unchanged.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::action::{ActionOrigin, BusyFlags, InFlight, InFlightGuard};
use crate::chat::{ChatMessage, ChatMode, ChatPanel, ChatView};
use crate::config::{Config, MalformedQuestionPolicy};
use crate::error::{Result, StudioError};
use crate::events::{EventBroadcaster, StudioEvent};
use crate::image::{EncodedImage, ImagePayload, ImageStudio, ImageStudioView};
use crate::provider::{ChatProvider, ImageProvider, QuizProvider};
use crate::quiz::{Quiz, QuizSummary};
use crate::session::{QuizSession, Selection, SessionOutcome, SessionState, SessionView};

// ============================================================================
// AppView
// ============================================================================

/// Top-level views of the front-end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppView {
    /// Topic form and quiz library.
    #[default]
    Home,
    /// A quiz being played.
    PlayQuiz,
    /// Image upload and transform.
    ImageStudio,
}

impl std::fmt::Display for AppView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Home => write!(f, "home"),
            Self::PlayQuiz => write!(f, "play-quiz"),
            Self::ImageStudio => write!(f, "image-studio"),
        }
    }
}

// ============================================================================
// StudioState
// ============================================================================

/// Generation counters, bumped whenever the owning view is discarded or
/// replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Generations {
    /// Bumped on every view change.
    pub navigation: u64,
    /// Bumped when the chat panel is closed.
    pub chat: u64,
    /// Bumped when the image studio is left or its source replaced.
    pub image: u64,
}

/// All application state.
#[derive(Debug, Default)]
pub struct StudioState {
    view: AppView,
    library: Vec<Arc<Quiz>>,
    session: Option<QuizSession>,
    chat: Option<ChatPanel>,
    images: ImageStudio,
    generations: Generations,
}

impl StudioState {
    /// Switches view, applying the leave rules of the old view.
    ///
    /// Returns `true` if the view changed.
    fn switch_view(&mut self, to: AppView) -> bool {
        if self.view == to {
            return false;
        }
        match self.view {
            AppView::PlayQuiz => self.session = None,
            AppView::ImageStudio => {
                self.images.clear();
                self.generations.image += 1;
            }
            AppView::Home => {}
        }
        self.view = to;
        self.generations.navigation += 1;
        true
    }

    fn find_quiz(&self, id: &str) -> Result<Arc<Quiz>> {
        self.library
            .iter()
            .find(|q| q.id == id)
            .cloned()
            .ok_or_else(|| StudioError::QuizNotFound(id.to_string()))
    }

    fn session_mut(&mut self) -> Result<&mut QuizSession> {
        self.session.as_mut().ok_or(StudioError::NoActiveSession)
    }

    fn start_session(&mut self, quiz: Arc<Quiz>) -> Result<bool> {
        let session = QuizSession::new(quiz)?;
        let changed = self.switch_view(AppView::PlayQuiz);
        self.session = Some(session);
        Ok(changed)
    }
}

// ============================================================================
// Snapshots and results
// ============================================================================

/// Full view snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioSnapshot {
    /// Current view.
    pub view: AppView,
    /// Quiz library, newest first.
    pub quizzes: Vec<QuizSummary>,
    /// Active session, if a quiz is being played.
    pub session: Option<SessionView>,
    /// Chat panel.
    pub chat: ChatView,
    /// Image studio.
    pub images: ImageStudioView,
    /// Disabled controls.
    pub busy: BusyFlags,
}

/// Result of a successful quiz generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuiz {
    /// The new library entry.
    pub quiz: QuizSummary,
    /// `false` if the user navigated away while generating.
    pub opened: bool,
}

/// Result of a selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResult {
    /// `false` if the selection was ignored.
    pub recorded: bool,
    /// Correctness of a recorded selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
    /// Session after the selection.
    pub session: SessionView,
}

// ============================================================================
// Studio
// ============================================================================

/// The three provider seams.
#[derive(Clone)]
pub struct Providers {
    /// Quiz generation.
    pub quiz: Arc<dyn QuizProvider>,
    /// Image transform.
    pub image: Arc<dyn ImageProvider>,
    /// Chat replies.
    pub chat: Arc<dyn ChatProvider>,
}

impl Providers {
    /// Uses one value for all three seams.
    pub fn shared<P>(provider: Arc<P>) -> Self
    where
        P: QuizProvider + ImageProvider + ChatProvider + 'static,
    {
        Self {
            quiz: Arc::clone(&provider) as Arc<dyn QuizProvider>,
            image: Arc::clone(&provider) as Arc<dyn ImageProvider>,
            chat: provider,
        }
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers").finish_non_exhaustive()
    }
}

/// Controller settings taken from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudioSettings {
    /// Questions requested per quiz.
    pub question_count: u32,
    /// Handling of malformed questions.
    pub malformed_questions: MalformedQuestionPolicy,
}

impl Default for StudioSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl StudioSettings {
    /// Extracts the controller settings.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            question_count: config.question_count,
            malformed_questions: config.malformed_questions,
        }
    }
}

/// Top-level controller.
#[derive(Debug)]
pub struct Studio {
    state: Mutex<StudioState>,
    in_flight: Arc<InFlight>,
    providers: Providers,
    events: EventBroadcaster,
    settings: StudioSettings,
}

impl Studio {
    /// Creates a controller on the home view with an empty library.
    #[must_use]
    pub fn new(providers: Providers, settings: StudioSettings) -> Self {
        Self {
            state: Mutex::new(StudioState::default()),
            in_flight: Arc::new(InFlight::default()),
            providers,
            events: EventBroadcaster::default(),
            settings,
        }
    }

    /// The event broadcaster.
    #[must_use]
    pub const fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    /// Which origins have a request outstanding.
    #[must_use]
    pub fn busy(&self) -> BusyFlags {
        self.in_flight.snapshot()
    }

    /// Returns the full view snapshot.
    pub async fn snapshot(&self) -> StudioSnapshot {
        let busy = self.busy();
        let state = self.state.lock().await;
        StudioSnapshot {
            view: state.view,
            quizzes: state.library.iter().map(|q| q.summary()).collect(),
            session: state.session.as_ref().map(QuizSession::view),
            chat: ChatView::of(state.chat.as_ref(), busy.chat_send),
            images: state.images.view(busy.image_transform),
            busy,
        }
    }

    fn report_failure(&self, origin: ActionOrigin, err: &StudioError) {
        warn!(origin = %origin, error = %err, "Action failed");
        if err.is_provider_failure() {
            self.events.send(StudioEvent::action_failed(origin));
        }
    }

    fn report_discarded(&self, origin: ActionOrigin) {
        info!(origin = %origin, "Discarding stale result");
        self.events.send(StudioEvent::result_discarded(origin));
    }

    /// Runs `work` on its own task and waits for it.
    ///
    /// The task keeps running if the returned future is dropped.
    async fn detach<T, F>(origin: ActionOrigin, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        tokio::spawn(work).await.map_err(|e| {
            warn!(origin = %origin, error = %e, "Action task failed");
            StudioError::TaskFailed(e.to_string())
        })?
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    /// Switches to `view`.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::InvalidStateTransition` for `play-quiz`, which is
    /// only reachable by starting a quiz.
    pub async fn navigate(&self, view: AppView) -> Result<AppView> {
        let mut state = self.state.lock().await;
        if view == AppView::PlayQuiz && state.view != AppView::PlayQuiz {
            return Err(StudioError::invalid_transition(state.view, view));
        }
        if state.switch_view(view) {
            info!(view = %view, "View changed");
            self.events.send(StudioEvent::view_changed(view));
        }
        Ok(state.view)
    }

    // ------------------------------------------------------------------------
    // Quizzes
    // ------------------------------------------------------------------------

    /// Quiz library summaries, newest first.
    pub async fn list_quizzes(&self) -> Vec<QuizSummary> {
        let state = self.state.lock().await;
        state.library.iter().map(|q| q.summary()).collect()
    }

    /// Returns a quiz from the library.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::QuizNotFound` for an unknown id.
    pub async fn get_quiz(&self, id: &str) -> Result<Quiz> {
        let state = self.state.lock().await;
        state.find_quiz(id).map(|q| (*q).clone())
    }

    /// Generates a quiz on `topic` and adds it to the library.
    ///
    /// The quiz opens in the play view unless the user navigated while it was
    /// being generated. On failure nothing is installed.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::EmptyTopic` for a blank topic,
    /// `StudioError::RequestInFlight` if a generation is already running, or
    /// the provider/validation failure.
    pub async fn generate_quiz(self: &Arc<Self>, topic: &str) -> Result<GeneratedQuiz> {
        let origin = ActionOrigin::QuizGeneration;
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(StudioError::EmptyTopic);
        }
        let guard = self.in_flight.begin(origin)?;
        let token = self.state.lock().await.generations.navigation;

        let studio = Arc::clone(self);
        let topic = topic.to_string();
        Self::detach(origin, async move {
            studio.complete_quiz(guard, topic, token).await
        })
        .await
    }

    async fn complete_quiz(
        &self,
        _guard: InFlightGuard,
        topic: String,
        token: u64,
    ) -> Result<GeneratedQuiz> {
        let origin = ActionOrigin::QuizGeneration;
        let count = self.settings.question_count;
        debug!(topic = %topic, question_count = count, "Requesting quiz");
        let generated = self
            .providers
            .quiz
            .generate_quiz(&topic, count)
            .await
            .and_then(|draft| Quiz::from_draft(&topic, draft, self.settings.malformed_questions));

        let quiz = match generated {
            Ok(quiz) => Arc::new(quiz),
            Err(e) => {
                self.report_failure(origin, &e);
                return Err(e);
            }
        };

        let mut state = self.state.lock().await;
        state.library.insert(0, Arc::clone(&quiz));
        let opened = state.generations.navigation == token;
        let view_changed = if opened {
            state.start_session(Arc::clone(&quiz))?
        } else {
            false
        };
        drop(state);

        info!(quiz_id = %quiz.id, questions = quiz.question_count(), opened, "Quiz generated");
        let summary = quiz.summary();
        self.events
            .send(StudioEvent::quiz_generated(summary.clone(), opened));
        if view_changed {
            self.events.send(StudioEvent::view_changed(AppView::PlayQuiz));
        }
        Ok(GeneratedQuiz {
            quiz: summary,
            opened,
        })
    }

    /// Starts a fresh session on a library quiz and opens the play view.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::QuizNotFound` for an unknown id.
    pub async fn start_quiz(&self, id: &str) -> Result<SessionView> {
        let mut state = self.state.lock().await;
        let quiz = state.find_quiz(id)?;
        let view_changed = state.start_session(quiz)?;
        let view = state.session_mut()?.view();
        drop(state);

        info!(quiz_id = %id, "Quiz started");
        if view_changed {
            self.events.send(StudioEvent::view_changed(AppView::PlayQuiz));
        }
        Ok(view)
    }

    // ------------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------------

    /// The active session.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::NoActiveSession` if no quiz is being played.
    pub async fn session(&self) -> Result<SessionView> {
        let mut state = self.state.lock().await;
        Ok(state.session_mut()?.view())
    }

    /// Selects an option on the current question.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::NoActiveSession` or
    /// `StudioError::OptionOutOfRange`.
    pub async fn select_option(&self, option: usize) -> Result<SelectionResult> {
        let mut state = self.state.lock().await;
        let session = state.session_mut()?;
        let selection = session.select_option(option)?;
        let view = session.view();
        drop(state);

        let correct = match selection {
            Selection::Recorded { correct } => {
                debug!(option, correct, score = view.score, "Answer recorded");
                if let Some(index) = view.state.question_index() {
                    self.events.send(StudioEvent::answer_recorded(
                        index, option, correct, view.score,
                    ));
                }
                Some(correct)
            }
            Selection::Ignored => None,
        };

        Ok(SelectionResult {
            recorded: correct.is_some(),
            correct,
            session: view,
        })
    }

    /// Moves past the reviewed question.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::NoActiveSession` or
    /// `StudioError::InvalidStateTransition` unless reviewing.
    pub async fn advance(&self) -> Result<SessionView> {
        let mut state = self.state.lock().await;
        let session = state.session_mut()?;
        let next = session.advance()?;
        let view = session.view();
        drop(state);

        if let SessionState::Finished { score } = next {
            info!(quiz_id = %view.quiz_id, score, total = view.question_count, "Quiz finished");
            self.events
                .send(StudioEvent::quiz_finished(score, view.question_count));
        }
        Ok(view)
    }

    /// Ends the session and returns to the home view.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::NoActiveSession` if no quiz is being played.
    pub async fn exit_session(&self) -> Result<SessionOutcome> {
        let mut state = self.state.lock().await;
        let session = state.session.take().ok_or(StudioError::NoActiveSession)?;
        let view_changed = state.switch_view(AppView::Home);
        drop(state);

        let outcome = session.exit();
        info!(quiz_id = %outcome.quiz_id, score = outcome.score, "Session exited");
        if view_changed {
            self.events.send(StudioEvent::view_changed(AppView::Home));
        }
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------------

    /// Opens the chat panel, creating it if absent.
    pub async fn open_chat(&self) -> ChatView {
        let busy = self.in_flight.is_busy(ActionOrigin::ChatSend);
        let mut state = self.state.lock().await;
        let panel = state.chat.get_or_insert_with(ChatPanel::default);
        ChatView::of(Some(panel), busy)
    }

    /// Closes the chat panel and discards its transcript.
    pub async fn close_chat(&self) {
        let mut state = self.state.lock().await;
        if state.chat.take().is_some() {
            state.generations.chat += 1;
            debug!("Chat panel closed");
        }
    }

    /// The chat panel.
    pub async fn chat(&self) -> ChatView {
        let busy = self.in_flight.is_busy(ActionOrigin::ChatSend);
        let state = self.state.lock().await;
        ChatView::of(state.chat.as_ref(), busy)
    }

    /// Toggles extended reasoning.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::ChatClosed` if the panel is not open.
    pub async fn set_chat_mode(&self, extended: bool) -> Result<ChatView> {
        let busy = self.in_flight.is_busy(ActionOrigin::ChatSend);
        let mut state = self.state.lock().await;
        let panel = state.chat.as_mut().ok_or(StudioError::ChatClosed)?;
        panel.mode = ChatMode::from_extended(extended);
        Ok(ChatView::of(Some(panel), busy))
    }

    /// Sends `prompt` and appends the reply.
    ///
    /// The user turn is appended before the provider is called. On provider
    /// failure a generic notice is appended in place of the reply.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::EmptyPrompt`, `StudioError::ChatClosed`,
    /// `StudioError::RequestInFlight`, `StudioError::Superseded` if the panel
    /// was closed meanwhile, or the provider failure.
    pub async fn send_chat(self: &Arc<Self>, prompt: &str) -> Result<ChatMessage> {
        let origin = ActionOrigin::ChatSend;
        if prompt.trim().is_empty() {
            return Err(StudioError::EmptyPrompt);
        }

        let mut state = self.state.lock().await;
        let panel = state.chat.as_mut().ok_or(StudioError::ChatClosed)?;
        let guard = self.in_flight.begin(origin)?;
        panel.transcript.push(ChatMessage::user(prompt));
        let mode = panel.mode;
        let token = state.generations.chat;
        drop(state);

        let studio = Arc::clone(self);
        let prompt = prompt.to_string();
        Self::detach(origin, async move {
            studio.complete_chat(guard, prompt, mode, token).await
        })
        .await
    }

    async fn complete_chat(
        &self,
        _guard: InFlightGuard,
        prompt: String,
        mode: ChatMode,
        token: u64,
    ) -> Result<ChatMessage> {
        let origin = ActionOrigin::ChatSend;
        debug!(mode = %mode, prompt_len = prompt.len(), "Sending chat prompt");
        let reply = self.providers.chat.reply(&prompt, mode).await;

        let mut state = self.state.lock().await;
        // Closing the panel bumps the token, so a match implies it is still open.
        if state.generations.chat != token {
            drop(state);
            self.report_discarded(origin);
            return Err(StudioError::Superseded(origin));
        }

        let (message, failure) = match reply {
            Ok(text) if text.trim().is_empty() => {
                (ChatMessage::model(mode.empty_reply_fallback(), mode), None)
            }
            Ok(text) => (ChatMessage::model(text, mode), None),
            Err(e) => (
                ChatMessage::model(origin.failure_notice(), ChatMode::Direct),
                Some(e),
            ),
        };
        if let Some(panel) = state.chat.as_mut() {
            panel.transcript.push(message.clone());
        }
        drop(state);

        self.events.send(StudioEvent::chat_reply(message.clone()));
        match failure {
            None => {
                info!(mode = %mode, reply_len = message.content.len(), "Chat reply received");
                Ok(message)
            }
            Some(e) => {
                self.report_failure(origin, &e);
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------------

    /// Replaces the source image and clears the previous result.
    ///
    /// Any transform still running for the old source will be discarded.
    pub async fn set_source_image(&self, image: ImagePayload) -> ImageStudioView {
        let busy = self.in_flight.is_busy(ActionOrigin::ImageTransform);
        let mut state = self.state.lock().await;
        debug!(mime_type = image.mime_type(), size = image.len(), "Source image set");
        state.images.set_source(image);
        state.generations.image += 1;
        state.images.view(busy)
    }

    /// Transforms the source image according to `instruction`.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::MissingImage`, `StudioError::MissingInstruction`,
    /// `StudioError::RequestInFlight`, `StudioError::Superseded` if the image
    /// studio was left or its source replaced meanwhile, or the provider
    /// failure.
    pub async fn transform_image(self: &Arc<Self>, instruction: &str) -> Result<EncodedImage> {
        let origin = ActionOrigin::ImageTransform;

        let state = self.state.lock().await;
        let source = state.images.source.clone().ok_or(StudioError::MissingImage)?;
        if instruction.trim().is_empty() {
            return Err(StudioError::MissingInstruction);
        }
        let guard = self.in_flight.begin(origin)?;
        let token = state.generations.image;
        drop(state);

        let studio = Arc::clone(self);
        let instruction = instruction.to_string();
        Self::detach(origin, async move {
            studio.complete_image(guard, source, instruction, token).await
        })
        .await
    }

    async fn complete_image(
        &self,
        _guard: InFlightGuard,
        source: ImagePayload,
        instruction: String,
        token: u64,
    ) -> Result<EncodedImage> {
        let origin = ActionOrigin::ImageTransform;
        debug!(mime_type = source.mime_type(), size = source.len(), "Requesting image transform");
        let transformed = self
            .providers
            .image
            .transform_image(&source, &instruction)
            .await;

        let mut state = self.state.lock().await;
        if state.generations.image != token {
            drop(state);
            self.report_discarded(origin);
            return Err(StudioError::Superseded(origin));
        }

        match transformed {
            Ok(image) => {
                let encoded = image.to_encoded();
                let (mime_type, size) = (image.mime_type(), image.len());
                state.images.result = Some(image);
                drop(state);

                info!(mime_type, size, "Image transformed");
                self.events.send(StudioEvent::image_ready(mime_type, size));
                Ok(encoded)
            }
            Err(e) => {
                drop(state);
                self.report_failure(origin, &e);
                Err(e)
            }
        }
    }

    /// The latest transformed image.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::NoResultImage` if there is none.
    pub async fn result_image(&self) -> Result<EncodedImage> {
        let state = self.state.lock().await;
        state
            .images
            .result
            .as_ref()
            .map(ImagePayload::to_encoded)
            .ok_or(StudioError::NoResultImage)
    }
}

// ============================================================================
// Tests
// ============================================================================
