//! Telegram Bot API wire types.
//!
//! Only the fields the bot reads or writes are modelled; everything else in
//! an update is ignored on decode.

use crate::event::{Command, Sender, UserEvent};
use parley_conversation::UserProfile;
use parley_core::{ChatId, MessageId, UserId};
use serde::{Deserialize, Serialize};

/// Response envelope shared by every Bot API method.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    fn into_sender(self) -> Sender {
        Sender {
            id: self.id,
            profile: UserProfile {
                username: self.username,
                first_name: Some(self.first_name),
                last_name: self.last_name,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl Update {
    /// Converts the update into the event the bot reacts to.
    ///
    /// Returns `None` for updates the bot ignores: non-text messages,
    /// messages from bots or without a sender, and callbacks without data.
    #[must_use]
    pub fn into_event(self) -> Option<UserEvent> {
        if let Some(query) = self.callback_query {
            let key = query.data?;
            let (chat_id, message_id) = match query.message {
                Some(message) => (message.chat.id, Some(message.message_id)),
                // Inline-mode callbacks have no chat; reply privately.
                None => (ChatId::new(query.from.id.get()), None),
            };
            return Some(UserEvent::MenuSelection {
                user: query.from.into_sender(),
                chat_id,
                key,
                message_id,
                callback_id: query.id,
            });
        }

        let message = self.message?;
        let from = message.from.filter(|user| !user.is_bot)?;
        let text = message.text?;
        let user = from.into_sender();

        Some(match Command::parse(&text) {
            Some(command) => UserEvent::Command {
                user,
                chat_id: message.chat.id,
                command,
                message_id: message.message_id,
            },
            None => UserEvent::TextMessage {
                user,
                chat_id: message.chat.id,
                text,
                message_id: message.message_id,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_ai::Provider;

    fn parse(json: &str) -> Update {
        serde_json::from_str(json).expect("valid update")
    }

    #[test]
    fn text_message_becomes_text_event() {
        let update = parse(
            r#"{
                "update_id": 10,
                "message": {
                    "message_id": 5,
                    "date": 1700000000,
                    "from": {"id": 42, "is_bot": false, "first_name": "Ada", "username": "ada"},
                    "chat": {"id": 42, "type": "private"},
                    "text": "Hello"
                }
            }"#,
        );

        let Some(UserEvent::TextMessage {
            user,
            chat_id,
            text,
            message_id,
        }) = update.into_event()
        else {
            panic!("expected text event");
        };
        assert_eq!(user.id, UserId::new(42));
        assert_eq!(user.profile.username.as_deref(), Some("ada"));
        assert_eq!(chat_id, ChatId::new(42));
        assert_eq!(text, "Hello");
        assert_eq!(message_id, MessageId::new(5));
    }

    #[test]
    fn slash_text_becomes_command() {
        let update = parse(
            r#"{
                "update_id": 11,
                "message": {
                    "message_id": 6,
                    "from": {"id": 42, "first_name": "Ada"},
                    "chat": {"id": 42},
                    "text": "/perplexity"
                }
            }"#,
        );

        assert!(matches!(
            update.into_event(),
            Some(UserEvent::Command {
                command: Command::UseProvider(Provider::Perplexity),
                ..
            })
        ));
    }

    #[test]
    fn callback_becomes_menu_selection() {
        let update = parse(
            r#"{
                "update_id": 12,
                "callback_query": {
                    "id": "cb-1",
                    "from": {"id": 42, "first_name": "Ada"},
                    "message": {"message_id": 7, "chat": {"id": -100}},
                    "data": "prompt_teacher"
                }
            }"#,
        );

        let Some(UserEvent::MenuSelection {
            chat_id,
            key,
            message_id,
            callback_id,
            ..
        }) = update.into_event()
        else {
            panic!("expected menu selection");
        };
        assert_eq!(chat_id, ChatId::new(-100));
        assert_eq!(key, "prompt_teacher");
        assert_eq!(message_id, Some(MessageId::new(7)));
        assert_eq!(callback_id, "cb-1");
    }

    #[test]
    fn ignored_updates() {
        let photo = parse(
            r#"{"update_id": 1, "message": {"message_id": 1, "from": {"id": 1, "first_name": "A"}, "chat": {"id": 1}}}"#,
        );
        assert!(photo.into_event().is_none());

        let from_bot = parse(
            r#"{"update_id": 2, "message": {"message_id": 1, "from": {"id": 1, "is_bot": true, "first_name": "B"}, "chat": {"id": 1}, "text": "hi"}}"#,
        );
        assert!(from_bot.into_event().is_none());

        let edited = parse(r#"{"update_id": 3, "edited_message": {}}"#);
        assert!(edited.into_event().is_none());
    }

    #[test]
    fn api_error_envelope_decodes() {
        let response: ApiResponse<bool> = serde_json::from_str(
            r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#,
        )
        .unwrap();
        assert!(!response.ok);
        assert_eq!(response.error_code, Some(401));
        assert!(response.result.is_none());
    }
}
