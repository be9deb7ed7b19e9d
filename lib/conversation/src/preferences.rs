//! Per-user preferences and profile metadata.

use parley_ai::{CompletionParams, Persona, Provider};
use serde::{Deserialize, Serialize};

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default completion length limit.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// A user's preference record.
///
/// Always complete: missing records resolve to [`Preferences::default`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Which provider answers this user.
    pub provider: Provider,
    /// Which system prompt shapes the replies.
    pub persona: Persona,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens per reply.
    pub max_tokens: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            persona: Persona::default(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl Preferences {
    /// Returns the sampling parameters for a completion call.
    #[must_use]
    pub fn completion_params(&self) -> CompletionParams {
        CompletionParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            persona: self.persona,
        }
    }
}

/// Display metadata for a user, as reported by the transport.
///
/// Overwritten wholesale on every upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Handle, without the leading `@`.
    pub username: Option<String>,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
}

impl UserProfile {
    /// Returns the best name to address the user by.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.first_name
            .as_deref()
            .or(self.username.as_deref())
            .or(self.last_name.as_deref())
    }
}
