//! Error types for the conversation crate.
//!
//! Store failures never block a conversation: the session manager logs them
//! and falls back to defaults (empty history, default preferences). Provider
//! failures are reported with `parley_ai::ProviderError` unchanged.

use std::fmt;

/// Errors from the durable settings and history stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached.
    Unavailable { reason: String },
    /// A query or write was rejected.
    QueryFailed { reason: String },
    /// Stored data could not be decoded.
    InvalidData { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "store unavailable: {reason}"),
            Self::QueryFailed { reason } => write!(f, "store query failed: {reason}"),
            Self::InvalidData { reason } => write!(f, "invalid stored data: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}
