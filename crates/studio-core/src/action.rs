//! Action origins and the one-request-in-flight rule.
//!
//! Each user-initiated action has an origin. At most one request per origin may
//! be outstanding; different origins run independently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};

/// The control that triggered a provider request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOrigin {
    /// "Generate" on the quiz topic form.
    QuizGeneration,
    /// "Send" in the chat panel.
    ChatSend,
    /// "Transform Image" in the image studio.
    ImageTransform,
}

impl ActionOrigin {
    /// The single generic notice shown to the user when this action fails.
    #[must_use]
    pub const fn failure_notice(&self) -> &'static str {
        match self {
            Self::QuizGeneration => {
                "Failed to generate quiz. Gemini might be busy or the topic was too obscure."
            }
            Self::ChatSend => "Sorry, I encountered an error. Please try again.",
            Self::ImageTransform => "Failed to edit image. Try a clearer prompt.",
        }
    }
}

impl std::fmt::Display for ActionOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuizGeneration => write!(f, "quiz generation"),
            Self::ChatSend => write!(f, "chat"),
            Self::ImageTransform => write!(f, "image transform"),
        }
    }
}

/// Busy flags, one per action origin.
#[derive(Debug, Default)]
pub struct InFlight {
    quiz_generation: AtomicBool,
    chat_send: AtomicBool,
    image_transform: AtomicBool,
}

impl InFlight {
    const fn flag(&self, origin: ActionOrigin) -> &AtomicBool {
        match origin {
            ActionOrigin::QuizGeneration => &self.quiz_generation,
            ActionOrigin::ChatSend => &self.chat_send,
            ActionOrigin::ImageTransform => &self.image_transform,
        }
    }

    /// Marks `origin` as busy, returning a guard that clears the flag on drop.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::RequestInFlight` if a request from the same origin
    /// is already outstanding.
    pub fn begin(self: &Arc<Self>, origin: ActionOrigin) -> Result<InFlightGuard> {
        self.flag(origin)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StudioError::RequestInFlight(origin))?;
        Ok(InFlightGuard {
            flags: Arc::clone(self),
            origin,
        })
    }

    /// Returns `true` if a request from `origin` is outstanding.
    #[must_use]
    pub fn is_busy(&self, origin: ActionOrigin) -> bool {
        self.flag(origin).load(Ordering::Acquire)
    }

    /// Returns the busy flags as a serializable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> BusyFlags {
        BusyFlags {
            quiz_generation: self.is_busy(ActionOrigin::QuizGeneration),
            chat_send: self.is_busy(ActionOrigin::ChatSend),
            image_transform: self.is_busy(ActionOrigin::ImageTransform),
        }
    }
}

/// Releases the busy flag for its origin when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    flags: Arc<InFlight>,
    origin: ActionOrigin,
}

impl InFlightGuard {
    /// The origin this guard holds.
    #[must_use]
    pub const fn origin(&self) -> ActionOrigin {
        self.origin
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flags.flag(self.origin).store(false, Ordering::Release);
    }
}

/// Which controls are currently disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusyFlags {
    /// Quiz generation is outstanding.
    pub quiz_generation: bool,
    /// A chat send is outstanding.
    pub chat_send: bool,
    /// An image transform is outstanding.
    pub image_transform: bool,
}
