//! Domain error types for server operations.
//!
//! These are the contexts carried by rootcause reports at the process
//! boundary: Telegram calls return `Report<TransportError>` and bootstrap
//! returns `Report<StartupError>`.

use parley_conversation::StoreError;
use std::fmt;

/// Telegram Bot API errors.
#[derive(Debug)]
pub enum TransportError {
    /// The HTTP request could not be completed.
    Request { method: String, details: String },
    /// The Bot API answered with `ok: false`.
    Api {
        method: String,
        code: Option<i64>,
        description: String,
    },
    /// The response body could not be decoded.
    Decode { method: String, details: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request { method, details } => {
                write!(f, "telegram {method} request failed: {details}")
            }
            Self::Api {
                method,
                code: Some(code),
                description,
            } => {
                write!(f, "telegram {method} rejected ({code}): {description}")
            }
            Self::Api {
                method,
                code: None,
                description,
            } => {
                write!(f, "telegram {method} rejected: {description}")
            }
            Self::Decode { method, details } => {
                write!(f, "invalid telegram {method} response: {details}")
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors that abort startup.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration is missing or invalid.
    Config { details: String },
    /// The database could not be reached.
    Database { details: String },
    /// Migrations failed to apply.
    Migration { details: String },
    /// A provider adapter could not be built.
    Provider { details: String },
    /// The listen socket could not be bound.
    Bind { addr: String, details: String },
    /// Webhook registration failed.
    Webhook { details: String },
    /// The HTTP server stopped with an error.
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "invalid configuration: {details}"),
            Self::Database { details } => write!(f, "database connection failed: {details}"),
            Self::Migration { details } => write!(f, "database migration failed: {details}"),
            Self::Provider { details } => write!(f, "provider setup failed: {details}"),
            Self::Bind { addr, details } => write!(f, "failed to bind {addr}: {details}"),
            Self::Webhook { details } => write!(f, "webhook registration failed: {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for StartupError {}

/// Maps a database error onto the store error taxonomy.
pub fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable {
                reason: err.to_string(),
            }
        }
        sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => StoreError::InvalidData {
            reason: err.to_string(),
        },
        _ => StoreError::QueryFailed {
            reason: err.to_string(),
        },
    }
}
