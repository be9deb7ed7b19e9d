//! Outbound messages and reply delivery.

use crate::error::TransportError;
use async_trait::async_trait;
use parley_core::{ChatId, MessageId};
use std::time::Duration;
use tracing::debug;

/// An inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    /// Callback key delivered back when pressed.
    pub key: String,
}

impl Button {
    #[must_use]
    pub fn new(label: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            key: key.into(),
        }
    }
}

/// Rows of inline buttons attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    #[must_use]
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }
}

/// A message to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessage {
    pub chat_id: ChatId,
    pub text: String,
    /// Quote this message in the reply.
    pub reply_to: Option<MessageId>,
    /// Edit this message in place instead of sending a new one.
    pub replace_message_id: Option<MessageId>,
    pub keyboard: Option<Keyboard>,
}

impl SendMessage {
    #[must_use]
    pub fn new(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to: None,
            replace_message_id: None,
            keyboard: None,
        }
    }

    #[must_use]
    pub fn reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    #[must_use]
    pub fn replacing(mut self, message_id: Option<MessageId>) -> Self {
        self.replace_message_id = message_id;
        self
    }

    #[must_use]
    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// The chat platform as seen by the dispatcher.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends or edits a message and returns its id.
    async fn send(&self, message: &SendMessage) -> parley_core::Result<MessageId, TransportError>;

    /// Shows the "typing" indicator.
    async fn typing(&self, chat_id: ChatId) -> parley_core::Result<(), TransportError>;

    /// Deletes a message.
    async fn delete(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> parley_core::Result<(), TransportError>;

    /// Acknowledges a button press.
    async fn answer_callback(&self, callback_id: &str) -> parley_core::Result<(), TransportError>;
}

/// How long replies are split and paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Maximum characters per part, before the part label.
    pub chunk_size: usize,
    /// Pause between parts.
    pub delay: Duration,
}

/// Splits a reply into labelled parts of at most `chunk_size` characters.
///
/// Short replies are returned unchanged. Splits fall on char boundaries.
#[must_use]
pub fn chunk_reply(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    if text.chars().count() <= chunk_size {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    let parts: Vec<String> = chars
        .chunks(chunk_size)
        .map(|chunk| chunk.iter().collect())
        .collect();
    let total = parts.len();
    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| format!("Part {}/{}:\n\n{}", i + 1, total, part))
        .collect()
}

/// Sends a reply in parts, quoting `reply_to` on the first one.
///
/// # Errors
///
/// Stops at the first part that fails to send.
pub async fn deliver_reply(
    transport: &dyn Transport,
    chat_id: ChatId,
    text: &str,
    reply_to: Option<MessageId>,
    delivery: Delivery,
) -> parley_core::Result<(), TransportError> {
    let parts = chunk_reply(text, delivery.chunk_size);
    let total = parts.len();
    for (i, part) in parts.into_iter().enumerate() {
        let mut message = SendMessage::new(chat_id, part);
        if i == 0 {
            message.reply_to = reply_to;
        }
        transport.send(&message).await?;

        if i + 1 < total {
            debug!(chat_id = %chat_id, part = i + 1, total, "Pausing between reply parts");
            tokio::time::sleep(delivery.delay).await;
        }
    }
    Ok(())
}
