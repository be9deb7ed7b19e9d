//! OpenAI chat-completions adapter.

use crate::backend::{ChatMessage, Completion, CompletionParams, Provider, ProviderAdapter, ProviderConfig};
use crate::chat_completions::ChatCompletionsClient;
use crate::error::ProviderError;
use async_trait::async_trait;
use tracing::instrument;

/// Adapter for the OpenAI API.
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    client: ChatCompletionsClient,
}

impl OpenAiAdapter {
    /// Creates an adapter from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: ChatCompletionsClient::new(Provider::OpenAi, config, "OpenAI API error")?,
        })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    #[instrument(skip(self, messages), fields(model = %self.client.model(), messages = messages.len(), persona = %params.persona))]
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<Completion, ProviderError> {
        self.client.send(messages, params).await
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn model(&self) -> &str {
        self.client.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_completions::testing::{dead_endpoint, serve};
    use crate::error::ProviderErrorKind;
    use axum::http::StatusCode;

    fn adapter(base_url: &str) -> OpenAiAdapter {
        OpenAiAdapter::new(ProviderConfig::openai("sk-test").with_base_url(base_url)).unwrap()
    }

    #[tokio::test]
    async fn sends_wire_request_and_normalizes_reply() {
        let (base, captured) = serve(
            StatusCode::OK,
            r#"{"choices":[{"message":{"content":"Hello there"}}],"usage":{"prompt_tokens":9,"completion_tokens":2}}"#,
        )
        .await;

        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("Hello")];
        let completion = adapter(&base)
            .complete(&messages, &CompletionParams::default())
            .await
            .unwrap();

        assert_eq!(completion.content, "Hello there");
        assert_eq!(completion.usage.unwrap().total(), 11);

        let captured = captured.lock().unwrap().clone();
        assert_eq!(captured.authorization.as_deref(), Some("Bearer sk-test"));
        let body = captured.body.unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello");
    }

    #[tokio::test]
    async fn non_success_status_carries_provider_message() {
        let (base, _) = serve(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
        )
        .await;

        let err = adapter(&base)
            .complete(&[ChatMessage::user("hi")], &CompletionParams::default())
            .await
            .unwrap_err();

        assert_eq!(err.provider, Provider::OpenAi);
        assert_eq!(err.kind, ProviderErrorKind::Status(401));
        assert_eq!(err.message, "Incorrect API key provided");
    }

    #[tokio::test]
    async fn malformed_success_body_is_normalized() {
        let (base, _) = serve(StatusCode::OK, r#"{"unexpected":true}"#).await;

        let err = adapter(&base)
            .complete(&[ChatMessage::user("hi")], &CompletionParams::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ProviderErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn connection_failure_is_transport_error() {
        let base = dead_endpoint().await;

        let err = adapter(&base)
            .complete(&[ChatMessage::user("hi")], &CompletionParams::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ProviderErrorKind::Transport);
        assert!(!err.message.is_empty());
    }
}
