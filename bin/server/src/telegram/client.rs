//! Telegram Bot API client.

use super::types::{ApiResponse, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update};
use crate::config::TelegramConfig;
use crate::error::TransportError;
use crate::outbound::{Keyboard, SendMessage, Transport};
use async_trait::async_trait;
use parley_core::{ChatId, MessageId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

/// Thin JSON client over the Bot API methods the bot uses.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
    poll_timeout_secs: u64,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The base URL embeds the bot token.
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ReplyParameters {
    message_id: MessageId,
    allow_sending_without_reply: bool,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_parameters: Option<ReplyParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct EditMessageTextRequest<'a> {
    chat_id: ChatId,
    message_id: MessageId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct ChatActionRequest {
    chat_id: ChatId,
    action: &'static str,
}

#[derive(Serialize)]
struct DeleteMessageRequest {
    chat_id: ChatId,
    message_id: MessageId,
}

#[derive(Serialize)]
struct AnswerCallbackRequest<'a> {
    callback_query_id: &'a str,
}

#[derive(Serialize)]
struct SetWebhookRequest<'a> {
    url: &'a str,
    allowed_updates: &'a [&'a str],
    drop_pending_updates: bool,
}

#[derive(Serialize)]
struct DeleteWebhookRequest {
    drop_pending_updates: bool,
}

#[derive(Serialize)]
struct GetUpdatesRequest<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

/// Update kinds the bot subscribes to.
pub const ALLOWED_UPDATES: [&str; 2] = ["message", "callback_query"];

impl From<&Keyboard> for InlineKeyboardMarkup {
    fn from(keyboard: &Keyboard) -> Self {
        Self {
            inline_keyboard: keyboard
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| InlineKeyboardButton {
                            text: button.label.clone(),
                            callback_data: button.key.clone(),
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

impl TelegramClient {
    /// Creates a client for the configured bot.
    #[must_use]
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
            poll_timeout_secs: config.poll_timeout_secs,
        }
    }

    async fn call<T, B>(
        &self,
        method: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> parley_core::Result<T, TransportError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self
            .http
            .post(format!("{}/{method}", self.base))
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // Errors are stripped of their URL so the token never reaches logs.
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Request {
                method: method.to_string(),
                details: e.without_url().to_string(),
            })?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request {
                method: method.to_string(),
                details: e.without_url().to_string(),
            })?;
        let envelope: ApiResponse<T> =
            serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode {
                method: method.to_string(),
                details: e.to_string(),
            })?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { ok: true, .. } => Err(TransportError::Decode {
                method: method.to_string(),
                details: "missing result".to_string(),
            }
            .into()),
            ApiResponse {
                error_code,
                description,
                ..
            } => Err(TransportError::Api {
                method: method.to_string(),
                code: error_code,
                description: description.unwrap_or_else(|| "unknown error".to_string()),
            }
            .into()),
        }
    }

    /// Sends a new message.
    #[instrument(skip(self, text, keyboard), fields(chat_id = %chat_id))]
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
        keyboard: Option<&Keyboard>,
    ) -> parley_core::Result<Message, TransportError> {
        let request = SendMessageRequest {
            chat_id,
            text,
            reply_parameters: reply_to.map(|message_id| ReplyParameters {
                message_id,
                allow_sending_without_reply: true,
            }),
            reply_markup: keyboard.map(InlineKeyboardMarkup::from),
        };
        self.call("sendMessage", &request, None).await
    }

    /// Replaces the text and keyboard of an existing message.
    #[instrument(skip(self, text, keyboard), fields(chat_id = %chat_id, message_id = %message_id))]
    pub async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> parley_core::Result<(), TransportError> {
        let request = EditMessageTextRequest {
            chat_id,
            message_id,
            text,
            reply_markup: keyboard.map(InlineKeyboardMarkup::from),
        };
        // The result is the edited message or `true`; neither is needed.
        let _: serde_json::Value = self.call("editMessageText", &request, None).await?;
        Ok(())
    }

    pub async fn send_chat_action(&self, chat_id: ChatId) -> parley_core::Result<(), TransportError> {
        let request = ChatActionRequest {
            chat_id,
            action: "typing",
        };
        let _: bool = self.call("sendChatAction", &request, None).await?;
        Ok(())
    }

    pub async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> parley_core::Result<(), TransportError> {
        let request = DeleteMessageRequest {
            chat_id,
            message_id,
        };
        let _: bool = self.call("deleteMessage", &request, None).await?;
        Ok(())
    }

    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
    ) -> parley_core::Result<(), TransportError> {
        let request = AnswerCallbackRequest { callback_query_id };
        let _: bool = self.call("answerCallbackQuery", &request, None).await?;
        Ok(())
    }

    /// Registers the webhook, dropping updates queued while offline.
    #[instrument(skip(self, url))]
    pub async fn set_webhook(&self, url: &str) -> parley_core::Result<(), TransportError> {
        let request = SetWebhookRequest {
            url,
            allowed_updates: &ALLOWED_UPDATES,
            drop_pending_updates: true,
        };
        let _: bool = self.call("setWebhook", &request, None).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_webhook(&self) -> parley_core::Result<(), TransportError> {
        let request = DeleteWebhookRequest {
            drop_pending_updates: false,
        };
        let _: bool = self.call("deleteWebhook", &request, None).await?;
        Ok(())
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: i64) -> parley_core::Result<Vec<Update>, TransportError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: self.poll_timeout_secs,
            allowed_updates: &ALLOWED_UPDATES,
        };
        let timeout = Duration::from_secs(self.poll_timeout_secs + 10);
        let updates: Vec<Update> = self.call("getUpdates", &request, Some(timeout)).await?;
        debug!(count = updates.len(), offset, "Polled updates");
        Ok(updates)
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send(&self, message: &SendMessage) -> parley_core::Result<MessageId, TransportError> {
        match message.replace_message_id {
            Some(message_id) => {
                self.edit_message_text(
                    message.chat_id,
                    message_id,
                    &message.text,
                    message.keyboard.as_ref(),
                )
                .await?;
                Ok(message_id)
            }
            None => {
                let sent = self
                    .send_message(
                        message.chat_id,
                        &message.text,
                        message.reply_to,
                        message.keyboard.as_ref(),
                    )
                    .await?;
                Ok(sent.message_id)
            }
        }
    }

    async fn typing(&self, chat_id: ChatId) -> parley_core::Result<(), TransportError> {
        self.send_chat_action(chat_id).await
    }

    async fn delete(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> parley_core::Result<(), TransportError> {
        self.delete_message(chat_id, message_id).await
    }

    async fn answer_callback(&self, callback_id: &str) -> parley_core::Result<(), TransportError> {
        self.answer_callback_query(callback_id).await
    }
}
