//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys use
//! a double underscore, e.g. `TELEGRAM__BOT_TOKEN` or
//! `PROVIDERS__OPENAI__API_KEY`.

use parley_ai::{ProviderConfig, ProviderRegistry};
use parley_conversation::ConversationConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Telegram Bot API settings.
    pub telegram: TelegramConfig,

    /// PostgreSQL connection URL. Without one, users and history are kept
    /// in memory only.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Address the HTTP server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Completion provider credentials.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Conversation and delivery tunables.
    #[serde(default)]
    pub conversation: ConversationSettings,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather.
    pub bot_token: String,

    /// Public base URL for webhook delivery. Long polling is used when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Bot API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Long-poll timeout for `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

/// Provider credentials. Only configured providers are registered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: Option<ProviderSettings>,
    #[serde(default)]
    pub perplexity: Option<ProviderSettings>,
}

/// One provider's settings; unset fields fall back to the provider defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl ProviderSettings {
    fn apply(&self, mut defaults: ProviderConfig) -> ProviderConfig {
        if let Some(base_url) = &self.base_url {
            defaults = defaults.with_base_url(base_url.clone());
        }
        if let Some(model) = &self.model {
            defaults = defaults.with_model(model.clone());
        }
        defaults.request_timeout_secs = self.request_timeout_secs;
        defaults
    }

    /// Resolves into an OpenAI configuration.
    #[must_use]
    pub fn openai(&self) -> ProviderConfig {
        self.apply(ProviderConfig::openai(self.api_key.clone()))
    }

    /// Resolves into a Perplexity configuration.
    #[must_use]
    pub fn perplexity(&self) -> ProviderConfig {
        self.apply(ProviderConfig::perplexity(self.api_key.clone()))
    }
}

/// Conversation and delivery tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationSettings {
    /// Prior turns kept in the working context.
    #[serde(default = "default_window_turns")]
    pub window_turns: usize,

    /// Maximum characters per outbound message.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Pause between consecutive parts of a long reply, in milliseconds.
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_window_turns() -> usize {
    6
}

fn default_chunk_size() -> usize {
    4000
}

fn default_chunk_delay_ms() -> u64 {
    1000
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            window_turns: default_window_turns(),
            chunk_size: default_chunk_size(),
            chunk_delay_ms: default_chunk_delay_ms(),
        }
    }
}

impl ConversationSettings {
    /// Returns the session manager's share of the settings.
    #[must_use]
    pub fn manager_config(&self) -> ConversationConfig {
        ConversationConfig {
            window_turns: self.window_turns,
        }
    }

    #[must_use]
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Builds adapters for every configured provider.
    ///
    /// # Errors
    ///
    /// Returns an error if an adapter's HTTP client cannot be built.
    pub fn provider_registry(&self) -> Result<ProviderRegistry, parley_ai::ProviderError> {
        use parley_ai::{OpenAiAdapter, PerplexityAdapter};
        use std::sync::Arc;

        let mut registry = ProviderRegistry::new();
        if let Some(settings) = &self.providers.openai {
            registry.register(Arc::new(OpenAiAdapter::new(settings.openai())?));
        }
        if let Some(settings) = &self.providers.perplexity {
            registry.register(Arc::new(PerplexityAdapter::new(settings.perplexity())?));
        }
        Ok(registry)
    }
}
