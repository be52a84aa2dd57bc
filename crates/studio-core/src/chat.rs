//! Chat transcript types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// The person using the studio.
    User,
    /// The assistant.
    Model,
}

/// How the conversational provider is asked to answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    /// Plain reply with the assistant system instruction.
    #[default]
    Direct,
    /// Reply with a thinking budget.
    ExtendedReasoning,
}

impl ChatMode {
    /// Maps the panel toggle to a mode.
    #[must_use]
    pub const fn from_extended(extended: bool) -> Self {
        if extended {
            Self::ExtendedReasoning
        } else {
            Self::Direct
        }
    }

    /// Returns `true` for extended reasoning.
    #[must_use]
    pub const fn is_extended(&self) -> bool {
        matches!(self, Self::ExtendedReasoning)
    }

    /// Text used when the provider returns an empty reply.
    #[must_use]
    pub const fn empty_reply_fallback(&self) -> &'static str {
        match self {
            Self::Direct => "No response",
            Self::ExtendedReasoning => "I'm sorry, I couldn't generate a response.",
        }
    }
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::ExtendedReasoning => write!(f, "extended_reasoning"),
        }
    }
}

/// One message in a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Author.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
    /// Set on model replies produced in extended-reasoning mode.
    #[serde(default)]
    pub is_thinking: bool,
    /// When the message was appended.
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            is_thinking: false,
            timestamp: Utc::now(),
        }
    }

    /// Creates a model reply produced in `mode`.
    #[must_use]
    pub fn model(content: impl Into<String>, mode: ChatMode) -> Self {
        Self {
            role: ChatRole::Model,
            content: content.into(),
            is_thinking: mode.is_extended(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only list of chat messages owned by one panel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
}

impl ChatTranscript {
    /// Creates an empty transcript.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Appends a message.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Messages in order.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if nothing has been said yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message.
    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

/// An open chat panel.
#[derive(Debug, Clone, Default)]
pub struct ChatPanel {
    /// The conversation so far.
    pub transcript: ChatTranscript,
    /// Current mode toggle.
    pub mode: ChatMode,
}

/// Snapshot of the chat panel for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    /// Whether the panel is open.
    pub open: bool,
    /// Whether extended reasoning is on.
    pub extended_reasoning: bool,
    /// Whether a reply is outstanding.
    pub waiting: bool,
    /// The conversation so far.
    pub messages: Vec<ChatMessage>,
}

impl ChatView {
    /// Renders an optional panel.
    #[must_use]
    pub fn of(panel: Option<&ChatPanel>, waiting: bool) -> Self {
        panel.map_or_else(
            || Self {
                open: false,
                extended_reasoning: false,
                waiting: false,
                messages: Vec::new(),
            },
            |panel| Self {
                open: true,
                extended_reasoning: panel.mode.is_extended(),
                waiting,
                messages: panel.transcript.messages().to_vec(),
            },
        )
    }
}
