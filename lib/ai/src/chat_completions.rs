//! OpenAI-compatible chat-completions wire format.
//!
//! Both providers accept `{model, messages, temperature, max_tokens}` with
//! bearer auth and answer with `{choices: [{message: {content}}], usage?}`.
//! This module owns that shape and the failure normalization; the adapters
//! only supply the endpoint, credentials and their own message shaping.

use crate::backend::{ChatMessage, Completion, CompletionParams, Provider, ProviderConfig, TokenUsage};
use crate::error::{ProviderError, ProviderErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<UsageBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct UsageBody {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
    detail: Option<JsonValue>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// An HTTP client bound to one provider's chat-completions endpoint.
#[derive(Debug, Clone)]
pub(crate) struct ChatCompletionsClient {
    http: reqwest::Client,
    provider: Provider,
    endpoint: String,
    api_key: String,
    model: String,
    fallback_error: &'static str,
}

impl ChatCompletionsClient {
    /// Builds a client from provider configuration.
    pub(crate) fn new(
        provider: Provider,
        config: ProviderConfig,
        fallback_error: &'static str,
    ) -> Result<Self, ProviderError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().map_err(|e| {
            ProviderError::new(provider, ProviderErrorKind::InvalidConfig, e.to_string())
        })?;

        Ok(Self {
            http,
            provider,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key,
            model: config.model,
            fallback_error,
        })
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    /// Sends one completion request. No retries.
    pub(crate) async fn send(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<Completion, ProviderError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.error(ProviderErrorKind::Transport, e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.error(ProviderErrorKind::Transport, e.to_string()))?;

        debug!(
            provider = %self.provider,
            status = status.as_u16(),
            bytes = bytes.len(),
            "chat completion response"
        );

        if !status.is_success() {
            let message =
                error_message(&bytes).unwrap_or_else(|| self.fallback_error.to_string());
            return Err(self.error(ProviderErrorKind::Status(status.as_u16()), message));
        }

        parse_completion(&bytes).map_err(|reason| self.error(ProviderErrorKind::MalformedResponse, reason))
    }

    fn error(&self, kind: ProviderErrorKind, message: impl Into<String>) -> ProviderError {
        ProviderError::new(self.provider, kind, message)
    }
}

/// Extracts the provider's message from an error envelope, if there is one.
fn error_message(body: &[u8]) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_slice(body).ok()?;
    if let Some(message) = envelope.error.and_then(|e| e.message) {
        return Some(message);
    }
    match envelope.detail? {
        JsonValue::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Normalizes a success body into a [`Completion`].
fn parse_completion(body: &[u8]) -> Result<Completion, String> {
    let parsed: ChatCompletionResponse =
        serde_json::from_slice(body).map_err(|e| format!("invalid response body: {e}"))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| "response contained no choices".to_string())?
        .message
        .content
        .ok_or_else(|| "response choice had no content".to_string())?;

    let usage = parsed.usage.map(|u| TokenUsage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
    });

    Ok(Completion { content, usage })
}

/// Loopback HTTP server used to exercise the adapters without network access.
#[cfg(test)]
pub(crate) mod testing {
    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use serde_json::Value as JsonValue;
    use std::sync::{Arc, Mutex};

    /// What the fake provider saw.
    #[derive(Debug, Default, Clone)]
    pub(crate) struct Captured {
        pub(crate) body: Option<JsonValue>,
        pub(crate) authorization: Option<String>,
    }

    #[derive(Clone)]
    struct FakeState {
        status: StatusCode,
        reply: String,
        captured: Arc<Mutex<Captured>>,
    }

    async fn handle(
        State(state): State<FakeState>,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, String) {
        let mut captured = state.captured.lock().unwrap();
        captured.body = serde_json::from_str(&body).ok();
        captured.authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        (state.status, state.reply.clone())
    }

    /// Serves `reply` with `status` on `/chat/completions` and returns the base URL.
    pub(crate) async fn serve(
        status: StatusCode,
        reply: impl Into<String>,
    ) -> (String, Arc<Mutex<Captured>>) {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let state = FakeState {
            status,
            reply: reply.into(),
            captured: captured.clone(),
        };
        let router = Router::new()
            .route("/chat/completions", post(handle))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        (format!("http://{addr}"), captured)
    }

    /// Returns a base URL nothing is listening on.
    pub(crate) async fn dead_endpoint() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_and_usage() {
        let body = br#"{"choices":[{"message":{"role":"assistant","content":"Hi!"}}],
            "usage":{"prompt_tokens":12,"completion_tokens":3,"total_tokens":15}}"#;
        let completion = parse_completion(body).unwrap();
        assert_eq!(completion.content, "Hi!");
        assert_eq!(completion.usage.unwrap().total(), 15);
    }

    #[test]
    fn usage_is_optional() {
        let body = br#"{"choices":[{"message":{"content":"ok"}}]}"#;
        assert_eq!(parse_completion(body).unwrap().usage, None);
    }

    #[test]
    fn empty_choices_is_malformed() {
        let err = parse_completion(br#"{"choices":[]}"#).unwrap_err();
        assert!(err.contains("no choices"));
    }

    #[test]
    fn non_json_is_malformed() {
        let err = parse_completion(b"<html>bad gateway</html>").unwrap_err();
        assert!(err.starts_with("invalid response body"));
    }

    #[test]
    fn error_message_prefers_error_object() {
        let body = br#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(error_message(body).as_deref(), Some("Incorrect API key provided"));
    }

    #[test]
    fn error_message_falls_back_to_detail() {
        assert_eq!(
            error_message(br#"{"detail":"model not found"}"#).as_deref(),
            Some("model not found")
        );
        assert_eq!(error_message(b"not json"), None);
        assert_eq!(error_message(br#"{"other":1}"#), None);
    }
}
