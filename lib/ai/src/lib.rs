//! Completion provider adapters for parley.
//!
//! This crate provides:
//!
//! - **Provider Adapter**: one async interface over heterogeneous completion
//!   backends, returning a normalized [`Completion`] or [`ProviderError`]
//! - **Registry**: enum-keyed lookup of the configured adapters
//! - **Personas**: the fixed set of system-prompt profiles

pub mod backend;
mod chat_completions;
pub mod error;
pub mod openai;
pub mod perplexity;
pub mod persona;
pub mod registry;

pub use backend::{
    ChatMessage, Completion, CompletionParams, ContextSource, MessageRole, Provider,
    ProviderAdapter, ProviderConfig, TokenUsage,
};
pub use error::{ProviderError, ProviderErrorKind};
pub use openai::OpenAiAdapter;
pub use perplexity::PerplexityAdapter;
pub use persona::{Persona, UnknownPersona};
pub use registry::ProviderRegistry;
