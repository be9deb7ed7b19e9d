//! Provider adapter abstraction.
//!
//! Provides a unified interface over the completion backends. Each backend
//! owns its endpoint, auth and wire quirks; callers only ever see
//! [`ProviderAdapter::complete`].

use crate::error::ProviderError;
use crate::persona::Persona;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Available completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Provider {
    /// OpenAI chat completions (the primary provider).
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Perplexity chat completions (the secondary provider).
    #[serde(rename = "perplexity")]
    Perplexity,
}

impl Provider {
    /// Every supported provider.
    pub const ALL: [Provider; 2] = [Self::OpenAi, Self::Perplexity];

    /// Returns the stable storage key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Perplexity => "perplexity",
        }
    }

    /// Returns a human-readable name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Perplexity => "Perplexity",
        }
    }

    /// Returns where this provider's conversation history is read from.
    #[must_use]
    pub const fn context_source(&self) -> ContextSource {
        match self {
            Self::OpenAi => ContextSource::InMemory,
            Self::Perplexity => ContextSource::Durable,
        }
    }

    /// Returns the provider a "switch" action should move to.
    #[must_use]
    pub const fn other(&self) -> Self {
        match self {
            Self::OpenAi => Self::Perplexity,
            Self::Perplexity => Self::OpenAi,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown provider: {s}"))
    }
}

/// Where prior turns are read from when assembling a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    /// The in-memory session window (hydrated from history on first contact).
    InMemory,
    /// The durable history store, queried on every turn.
    Durable,
}

/// Connection settings for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Bearer token.
    pub api_key: String,
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Optional whole-request timeout. `None` leaves the HTTP client default.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl ProviderConfig {
    /// Creates an OpenAI configuration with the default endpoint and model.
    #[must_use]
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            request_timeout_secs: None,
        }
    }

    /// Creates a Perplexity configuration with the default endpoint and model.
    #[must_use]
    pub fn perplexity(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.perplexity.ai".to_string(),
            model: "llama-3.1-sonar-small-128k-online".to_string(),
            request_timeout_secs: None,
        }
    }

    /// Overrides the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Sampling parameters for one completion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Persona the context was built for.
    pub persona: Persona,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
            persona: Persona::default(),
        }
    }
}

/// A message in a working context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt.
    System,
    /// User/human message.
    User,
    /// Assistant/AI message.
    Assistant,
}

/// A normalized completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// The generated content.
    pub content: String,
    /// Token usage, when the provider reports it.
    pub usage: Option<TokenUsage>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of prompt tokens.
    pub input_tokens: u32,
    /// Number of generated tokens.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Returns the total number of tokens.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Trait for completion backends.
///
/// Implementations perform exactly one attempt per call; retry policy, if
/// any, belongs to the caller.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Generates a completion for the given working context.
    ///
    /// # Errors
    ///
    /// Network failures, non-2xx responses and malformed bodies are all
    /// reported as a [`ProviderError`] carrying the provider's message.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<Completion, ProviderError>;

    /// Returns the provider this adapter talks to.
    fn provider(&self) -> Provider;

    /// Returns the model name.
    fn model(&self) -> &str;
}
