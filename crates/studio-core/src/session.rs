//! Quiz session state machine.
//!
//! A session walks one [`Quiz`] question by question:
//!
//! - `Answering(i)` -> `Reviewing(i, selected)` on the first `select_option`
//! - `Reviewing(i, _)` -> `Answering(i + 1)` on `advance`, or `Finished(score)`
//!   after the last question
//! - any state -> gone on `exit`
//!
//! Selections outside `Answering` are ignored silently. The quiz itself is
//! shared and never mutated; the score dies with the session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};
use crate::quiz::{Question, Quiz};

// ============================================================================
// SessionState
// ============================================================================

/// Where a session is in its question walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for an answer to question `index`.
    Answering {
        /// Zero-based question index.
        index: usize,
    },
    /// Question `index` was answered with `selected`; explanation visible.
    Reviewing {
        /// Zero-based question index.
        index: usize,
        /// The recorded option.
        selected: usize,
    },
    /// All questions answered.
    Finished {
        /// Final score.
        score: usize,
    },
}

impl SessionState {
    /// Returns `true` once the session is finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }

    /// Index of the current question, if the session is not finished.
    #[must_use]
    pub const fn question_index(&self) -> Option<usize> {
        match self {
            Self::Answering { index } | Self::Reviewing { index, .. } => Some(*index),
            Self::Finished { .. } => None,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Answering { index } => write!(f, "answering({index})"),
            Self::Reviewing { index, selected } => write!(f, "reviewing({index}, {selected})"),
            Self::Finished { score } => write!(f, "finished({score})"),
        }
    }
}

/// Result of a `select_option` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The selection was recorded for the current question.
    Recorded {
        /// Whether the selection matched the correct index.
        correct: bool,
    },
    /// The session was not answering; nothing changed.
    Ignored,
}

impl Selection {
    /// Returns `true` if the selection changed the session.
    #[must_use]
    pub const fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded { .. })
    }
}

// ============================================================================
// QuizSession
// ============================================================================

/// Transient progress through one quiz.
#[derive(Debug, Clone)]
pub struct QuizSession {
    quiz: Arc<Quiz>,
    state: SessionState,
    score: usize,
    answered: usize,
    started_at: DateTime<Utc>,
}

impl QuizSession {
    /// Starts a session at `Answering(0)` with score 0.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::EmptyQuiz` if the quiz has no questions.
    pub fn new(quiz: Arc<Quiz>) -> Result<Self> {
        if quiz.questions.is_empty() {
            return Err(StudioError::EmptyQuiz);
        }
        Ok(Self {
            quiz,
            state: SessionState::Answering { index: 0 },
            score: 0,
            answered: 0,
            started_at: Utc::now(),
        })
    }

    /// The quiz being played.
    #[must_use]
    pub fn quiz(&self) -> &Arc<Quiz> {
        &self.quiz
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Running score.
    #[must_use]
    pub const fn score(&self) -> usize {
        self.score
    }

    /// Number of questions answered so far.
    #[must_use]
    pub const fn questions_answered(&self) -> usize {
        self.answered
    }

    /// Number of questions in the quiz.
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.quiz.questions.len()
    }

    /// The question currently shown, if not finished.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.state
            .question_index()
            .and_then(|i| self.quiz.questions.get(i))
    }

    /// Records `option` as the answer to the current question.
    ///
    /// Outside `Answering` the call is a no-op returning
    /// [`Selection::Ignored`]. On a malformed question any index is accepted
    /// and scored by literal equality.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::OptionOutOfRange` if the current question is
    /// well-formed and `option` is not one of its options.
    pub fn select_option(&mut self, option: usize) -> Result<Selection> {
        let SessionState::Answering { index } = self.state else {
            return Ok(Selection::Ignored);
        };
        let question = &self.quiz.questions[index];

        if question.is_well_formed() && option >= question.options.len() {
            return Err(StudioError::OptionOutOfRange {
                option,
                option_count: question.options.len(),
            });
        }

        let correct = question.is_correct(option);
        if correct {
            self.score += 1;
        }
        self.answered += 1;
        self.state = SessionState::Reviewing {
            index,
            selected: option,
        };
        Ok(Selection::Recorded { correct })
    }

    /// Moves past the reviewed question.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::InvalidStateTransition` unless the session is
    /// reviewing.
    pub fn advance(&mut self) -> Result<SessionState> {
        let SessionState::Reviewing { index, .. } = self.state else {
            return Err(StudioError::invalid_transition(self.state, "next question"));
        };

        self.state = if index + 1 < self.question_count() {
            SessionState::Answering { index: index + 1 }
        } else {
            SessionState::Finished { score: self.score }
        };
        Ok(self.state)
    }

    /// Ends the session from any state.
    #[must_use]
    pub fn exit(self) -> SessionOutcome {
        SessionOutcome {
            quiz_id: self.quiz.id.clone(),
            score: self.score,
            questions_answered: self.answered,
            question_count: self.quiz.questions.len(),
            finished: self.state.is_terminal(),
        }
    }

    /// Renders the session for the play view.
    ///
    /// The correct index and explanation are only included while reviewing.
    #[must_use]
    pub fn view(&self) -> SessionView {
        let question = match self.state {
            SessionState::Answering { index } => Some(QuestionView::new(
                index,
                &self.quiz.questions[index],
                None,
            )),
            SessionState::Reviewing { index, selected } => Some(QuestionView::new(
                index,
                &self.quiz.questions[index],
                Some(selected),
            )),
            SessionState::Finished { .. } => None,
        };

        SessionView {
            quiz_id: self.quiz.id.clone(),
            title: self.quiz.title.clone(),
            state: self.state,
            score: self.score,
            questions_answered: self.answered,
            question_count: self.question_count(),
            started_at: self.started_at,
            question,
        }
    }
}

/// Summary returned when a session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    /// The quiz that was played.
    pub quiz_id: String,
    /// Final score.
    pub score: usize,
    /// Questions answered before exit.
    pub questions_answered: usize,
    /// Questions in the quiz.
    pub question_count: usize,
    /// Whether the session reached `Finished`.
    pub finished: bool,
}

/// Snapshot of a session for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// The quiz being played.
    pub quiz_id: String,
    /// Quiz title.
    pub title: String,
    /// State machine position.
    pub state: SessionState,
    /// Running score.
    pub score: usize,
    /// Questions answered so far.
    pub questions_answered: usize,
    /// Questions in the quiz.
    pub question_count: usize,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// Current question, absent once finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
}

/// The current question as shown to the player.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    /// Zero-based position in the quiz.
    pub index: usize,
    /// Question identifier.
    pub id: String,
    /// Prompt text.
    pub text: String,
    /// Answer options.
    pub options: Vec<String>,
    /// `false` if the question breaks the four-option contract.
    pub well_formed: bool,
    /// Recorded selection, when reviewing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<usize>,
    /// Correct index, revealed when reviewing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_index: Option<i64>,
    /// Explanation, revealed when reviewing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl QuestionView {
    fn new(index: usize, question: &Question, selected: Option<usize>) -> Self {
        let reviewing = selected.is_some();
        Self {
            index,
            id: question.id.clone(),
            text: question.text.clone(),
            options: question.options.clone(),
            well_formed: question.is_well_formed(),
            selected,
            correct_index: reviewing.then_some(question.correct_index),
            explanation: reviewing.then(|| question.explanation.clone()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
