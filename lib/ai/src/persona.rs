//! Persona catalog.
//!
//! A persona is a named system-prompt profile that shapes the tone of the
//! assistant's replies. The set is fixed at compile time; adding a profile
//! means adding a variant here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A system-prompt profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Concise, to-the-point helper.
    #[default]
    Assistant,
    /// Imaginative writer.
    Creative,
    /// Precise technical expert.
    Technical,
    /// Informal, friendly conversation partner.
    Casual,
    /// Patient explainer.
    Teacher,
}

impl Persona {
    /// Every persona, in menu order.
    pub const ALL: [Persona; 5] = [
        Self::Assistant,
        Self::Creative,
        Self::Technical,
        Self::Casual,
        Self::Teacher,
    ];

    /// Returns the stable storage key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::Creative => "creative",
            Self::Technical => "technical",
            Self::Casual => "casual",
            Self::Teacher => "teacher",
        }
    }

    /// Returns a short human-readable name.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Assistant => "Assistant",
            Self::Creative => "Creative",
            Self::Technical => "Technical",
            Self::Casual => "Friendly",
            Self::Teacher => "Teacher",
        }
    }

    /// Returns the system prompt sent at the head of every context.
    #[must_use]
    pub const fn system_prompt(&self) -> &'static str {
        match self {
            Self::Assistant => "You are a helpful AI assistant. Answer briefly and to the point.",
            Self::Creative => {
                "You are a creative writer. Use vivid imagery and metaphors in your answers."
            }
            Self::Technical => {
                "You are a technical expert. Give precise and detailed explanations."
            }
            Self::Casual => "You are a friendly companion. Talk informally and with humor.",
            Self::Teacher => {
                "You are an experienced teacher. Explain complex things in simple words."
            }
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a persona key is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPersona {
    /// The key that failed to match.
    pub name: String,
}

impl fmt::Display for UnknownPersona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown persona: {}", self.name)
    }
}

impl std::error::Error for UnknownPersona {}

impl FromStr for Persona {
    type Err = UnknownPersona;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPersona {
                name: s.to_string(),
            })
    }
}
