//! Quiz data model.
//!
//! A [`QuizDraft`] is what the quiz provider returns. [`Quiz::from_draft`]
//! stamps it with an identifier and creation time; the result is immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::MalformedQuestionPolicy;
use crate::error::{Result, StudioError};

/// Number of options every well-formed question carries.
pub const OPTIONS_PER_QUESTION: usize = 4;

// ============================================================================
// Provider payload
// ============================================================================

/// Quiz payload as returned by the quiz provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDraft {
    /// Title summarizing the topic.
    pub title: String,
    /// Questions in presentation order.
    pub questions: Vec<QuestionDraft>,
}

/// One question as returned by the quiz provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    /// Prompt text.
    pub text: String,
    /// Answer options.
    pub options: Vec<String>,
    /// Zero-based index of the correct option.
    ///
    /// Signed so that a negative index from the provider survives parsing and
    /// is caught by validation rather than by serde.
    pub correct_index: i64,
    /// Explanation shown after answering.
    pub explanation: String,
}

// ============================================================================
// Question
// ============================================================================

/// A multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Identifier, unique within its quiz (`q-<index>`).
    pub id: String,
    /// Prompt text.
    pub text: String,
    /// Answer options.
    pub options: Vec<String>,
    /// Zero-based index of the correct option.
    pub correct_index: i64,
    /// Explanation shown after answering.
    pub explanation: String,
}

impl Question {
    /// Returns `true` if the question has exactly four options and an
    /// in-range correct index.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.options.len() == OPTIONS_PER_QUESTION && self.correct_option().is_some()
    }

    /// The correct option index, if it points at an existing option.
    #[must_use]
    pub fn correct_option(&self) -> Option<usize> {
        usize::try_from(self.correct_index)
            .ok()
            .filter(|idx| *idx < self.options.len())
    }

    /// Literal correctness check used for scoring.
    ///
    /// On a malformed question whose correct index is out of range, no
    /// selection can match.
    #[must_use]
    pub fn is_correct(&self, selected: usize) -> bool {
        i64::try_from(selected).map_or(false, |selected| selected == self.correct_index)
    }

    fn validate(&self, position: usize) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(StudioError::malformed_quiz(format!(
                "question {} has no text",
                position + 1
            )));
        }
        if self.options.len() != OPTIONS_PER_QUESTION {
            return Err(StudioError::malformed_quiz(format!(
                "question {} has {} options, expected {OPTIONS_PER_QUESTION}",
                position + 1,
                self.options.len()
            )));
        }
        if self.correct_option().is_none() {
            return Err(StudioError::malformed_quiz(format!(
                "question {} has correct index {} outside 0..{}",
                position + 1,
                self.correct_index,
                self.options.len()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Quiz
// ============================================================================

/// A generated quiz. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    /// Unique identifier assigned at creation.
    pub id: String,
    /// Title summarizing the topic.
    pub title: String,
    /// The topic the user asked for.
    pub topic: String,
    /// Questions in presentation order (never empty).
    pub questions: Vec<Question>,
    /// When the quiz was generated.
    pub created_at: DateTime<Utc>,
}

impl Quiz {
    /// Builds a quiz from a provider draft.
    ///
    /// Assigns a fresh identifier, the current time, and `q-<index>` question
    /// identifiers. Under [`MalformedQuestionPolicy::Reject`] every question
    /// must be well-formed and the title non-empty.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::EmptyQuiz` if the draft has no questions, and
    /// `StudioError::MalformedQuiz` if validation is enabled and fails.
    pub fn from_draft(
        topic: impl Into<String>,
        draft: QuizDraft,
        policy: MalformedQuestionPolicy,
    ) -> Result<Self> {
        Self::with_metadata(
            Uuid::new_v4().to_string(),
            topic,
            Utc::now(),
            draft,
            policy,
        )
    }

    /// Builds a quiz from a draft with explicit identifier and timestamp.
    ///
    /// # Errors
    ///
    /// Same as [`Quiz::from_draft`].
    pub fn with_metadata(
        id: impl Into<String>,
        topic: impl Into<String>,
        created_at: DateTime<Utc>,
        draft: QuizDraft,
        policy: MalformedQuestionPolicy,
    ) -> Result<Self> {
        if draft.questions.is_empty() {
            return Err(StudioError::EmptyQuiz);
        }

        let questions: Vec<Question> = draft
            .questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| Question {
                id: format!("q-{i}"),
                text: q.text,
                options: q.options,
                correct_index: q.correct_index,
                explanation: q.explanation,
            })
            .collect();

        if policy == MalformedQuestionPolicy::Reject {
            if draft.title.trim().is_empty() {
                return Err(StudioError::malformed_quiz("quiz has no title"));
            }
            for (i, question) in questions.iter().enumerate() {
                question.validate(i)?;
            }
        }

        Ok(Self {
            id: id.into(),
            title: draft.title,
            topic: topic.into(),
            questions,
            created_at,
        })
    }

    /// Number of questions.
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Returns a summary for list views.
    #[must_use]
    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            topic: self.topic.clone(),
            question_count: self.question_count(),
            created_at: self.created_at,
        }
    }
}

/// Compact quiz description for the library list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    /// Quiz identifier.
    pub id: String,
    /// Quiz title.
    pub title: String,
    /// Originating topic.
    pub topic: String,
    /// Number of questions.
    pub question_count: usize,
    /// When the quiz was generated.
    pub created_at: DateTime<Utc>,
}
