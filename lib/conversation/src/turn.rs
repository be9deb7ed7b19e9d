//! Conversation turns.

use chrono::{DateTime, Utc};
use parley_ai::{ChatMessage, Provider};
use parley_core::{TurnId, UserId};
use serde::{Deserialize, Serialize};

/// One exchange: a user message and the assistant's response.
///
/// Turns are immutable once written and ordered by `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn identifier.
    pub id: TurnId,
    /// The user who sent the message.
    pub user_id: UserId,
    /// What the user said.
    pub user_message: String,
    /// What the assistant answered.
    pub assistant_response: String,
    /// Which backend produced the answer.
    pub provider: Provider,
    /// When the turn completed.
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Creates a turn stamped with the current time.
    #[must_use]
    pub fn new(
        user_id: UserId,
        user_message: impl Into<String>,
        assistant_response: impl Into<String>,
        provider: Provider,
    ) -> Self {
        Self {
            id: TurnId::new(),
            user_id,
            user_message: user_message.into(),
            assistant_response: assistant_response.into(),
            provider,
            created_at: Utc::now(),
        }
    }

    /// Overrides the timestamp.
    #[must_use]
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Returns the turn as a user/assistant message pair.
    #[must_use]
    pub fn messages(&self) -> [ChatMessage; 2] {
        [
            ChatMessage::user(self.user_message.clone()),
            ChatMessage::assistant(self.assistant_response.clone()),
        ]
    }
}
