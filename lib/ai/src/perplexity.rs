//! Perplexity chat-completions adapter.
//!
//! Perplexity speaks the same wire format as OpenAI but rejects contexts in
//! which user and assistant turns do not strictly alternate after the
//! optional system message. The adapter folds runs of same-role messages
//! together before sending.

use crate::backend::{
    ChatMessage, Completion, CompletionParams, MessageRole, Provider, ProviderAdapter,
    ProviderConfig,
};
use crate::chat_completions::ChatCompletionsClient;
use crate::error::ProviderError;
use async_trait::async_trait;
use tracing::instrument;

/// Adapter for the Perplexity API.
#[derive(Debug, Clone)]
pub struct PerplexityAdapter {
    client: ChatCompletionsClient,
}

impl PerplexityAdapter {
    /// Creates an adapter from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: ChatCompletionsClient::new(
                Provider::Perplexity,
                config,
                "Perplexity API error",
            )?,
        })
    }
}

/// Merges consecutive messages with the same role.
fn alternate_roles(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut merged: Vec<ChatMessage> = Vec::with_capacity(messages.len());
    for message in messages {
        match merged.last_mut() {
            Some(last) if last.role == message.role && message.role != MessageRole::System => {
                last.content.push_str("\n\n");
                last.content.push_str(&message.content);
            }
            _ => merged.push(message.clone()),
        }
    }
    merged
}

#[async_trait]
impl ProviderAdapter for PerplexityAdapter {
    #[instrument(skip(self, messages), fields(model = %self.client.model(), messages = messages.len(), persona = %params.persona))]
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<Completion, ProviderError> {
        let messages = alternate_roles(messages);
        self.client.send(&messages, params).await
    }

    fn provider(&self) -> Provider {
        Provider::Perplexity
    }

    fn model(&self) -> &str {
        self.client.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_completions::testing::serve;
    use crate::error::ProviderErrorKind;
    use axum::http::StatusCode;

    fn adapter(base_url: &str) -> PerplexityAdapter {
        PerplexityAdapter::new(ProviderConfig::perplexity("pplx-test").with_base_url(base_url))
            .unwrap()
    }

    #[test]
    fn merges_consecutive_same_role_messages() {
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("a"),
            ChatMessage::user("b"),
            ChatMessage::assistant("c"),
            ChatMessage::user("d"),
        ];

        let merged = alternate_roles(&messages);

        assert_eq!(merged.len(), 4);
        assert_eq!(merged[1], ChatMessage::user("a\n\nb"));
        assert_eq!(merged[2], ChatMessage::assistant("c"));
        assert_eq!(merged[3], ChatMessage::user("d"));
    }

    #[test]
    fn alternating_context_is_untouched() {
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("q1"),
            ChatMessage::assistant("a1"),
            ChatMessage::user("q2"),
        ];
        assert_eq!(alternate_roles(&messages), messages);
    }

    #[tokio::test]
    async fn sends_default_model_with_bearer_auth() {
        let (base, captured) = serve(
            StatusCode::OK,
            r#"{"choices":[{"message":{"content":"Fresh news"}}],"citations":["https://example.com"]}"#,
        )
        .await;

        let completion = adapter(&base)
            .complete(
                &[ChatMessage::system("sys"), ChatMessage::user("news?")],
                &CompletionParams::default(),
            )
            .await
            .unwrap();

        assert_eq!(completion.content, "Fresh news");
        assert_eq!(completion.usage, None);

        let captured = captured.lock().unwrap().clone();
        assert_eq!(captured.authorization.as_deref(), Some("Bearer pplx-test"));
        assert_eq!(
            captured.body.unwrap()["model"],
            "llama-3.1-sonar-small-128k-online"
        );
    }

    #[tokio::test]
    async fn error_without_envelope_uses_fallback_message() {
        let (base, _) = serve(StatusCode::BAD_GATEWAY, "upstream exploded").await;

        let err = adapter(&base)
            .complete(&[ChatMessage::user("hi")], &CompletionParams::default())
            .await
            .unwrap_err();

        assert_eq!(err.provider, Provider::Perplexity);
        assert_eq!(err.kind, ProviderErrorKind::Status(502));
        assert_eq!(err.message, "Perplexity API error");
    }
}
