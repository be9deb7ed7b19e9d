//! Error types for the provider crate.
//!
//! Every upstream failure, whatever its origin, collapses into a single
//! [`ProviderError`] whose `message` is what the provider (or the transport)
//! reported. Callers surface that message verbatim.

use crate::backend::Provider;
use std::fmt;

/// What went wrong on the way to a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// No adapter is registered for the provider.
    Unavailable,
    /// The adapter could not be built from its configuration.
    InvalidConfig,
    /// The request never produced an HTTP response.
    Transport,
    /// The provider answered with a non-2xx status.
    Status(u16),
    /// The response body did not have the expected shape.
    MalformedResponse,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "unavailable"),
            Self::InvalidConfig => write!(f, "invalid configuration"),
            Self::Transport => write!(f, "transport failure"),
            Self::Status(code) => write!(f, "HTTP {code}"),
            Self::MalformedResponse => write!(f, "malformed response"),
        }
    }
}

/// A normalized provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// The provider that failed.
    pub provider: Provider,
    /// Failure category.
    pub kind: ProviderErrorKind,
    /// The provider's own message.
    pub message: String,
}

impl ProviderError {
    /// Creates a new provider error.
    #[must_use]
    pub fn new(provider: Provider, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            message: message.into(),
        }
    }

    /// No adapter registered for `provider`.
    #[must_use]
    pub fn unavailable(provider: Provider) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::Unavailable,
            format!("{} is not configured", provider.display_name()),
        )
    }

    /// Returns the provider's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} request failed ({}): {}",
            self.provider.display_name(),
            self.kind,
            self.message
        )
    }
}

impl std::error::Error for ProviderError {}
