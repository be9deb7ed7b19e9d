//! Transport-neutral inbound events.

use parley_ai::Provider;
use parley_conversation::UserProfile;
use parley_core::{ChatId, MessageId, UserId};

/// Who sent an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub profile: UserProfile,
}

/// A slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    New,
    UseProvider(Provider),
    Help,
    Unknown(String),
}

impl Command {
    /// Parses message text that starts with `/`.
    ///
    /// Arguments and a trailing `@botname` are ignored. Returns `None` for
    /// text that is not a command.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.strip_prefix('/')?.split_whitespace().next().unwrap_or("");
        let name = word.split('@').next().unwrap_or(word);

        Some(match name {
            "start" => Self::Start,
            "new" => Self::New,
            "help" => Self::Help,
            other => match other.parse::<Provider>() {
                Ok(provider) => Self::UseProvider(provider),
                Err(_) => Self::Unknown(other.to_string()),
            },
        })
    }
}

/// An inbound user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    /// Free text for the assistant.
    TextMessage {
        user: Sender,
        chat_id: ChatId,
        text: String,
        message_id: MessageId,
    },
    /// A pressed inline-keyboard button.
    MenuSelection {
        user: Sender,
        chat_id: ChatId,
        key: String,
        /// The message carrying the keyboard, edited in place on reply.
        message_id: Option<MessageId>,
        callback_id: String,
    },
    /// A slash command.
    Command {
        user: Sender,
        chat_id: ChatId,
        command: Command,
        message_id: MessageId,
    },
}

impl UserEvent {
    #[must_use]
    pub fn user_id(&self) -> UserId {
        match self {
            Self::TextMessage { user, .. }
            | Self::MenuSelection { user, .. }
            | Self::Command { user, .. } => user.id,
        }
    }

    #[must_use]
    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::TextMessage { chat_id, .. }
            | Self::MenuSelection { chat_id, .. }
            | Self::Command { chat_id, .. } => *chat_id,
        }
    }
}
