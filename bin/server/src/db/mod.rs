//! Database repositories for parley.
//!
//! This module provides Postgres implementations of the conversation
//! stores:
//! - Users and their preferences
//! - The append-only turn log

pub mod turns;
pub mod users;

pub use turns::TurnRepository;
pub use users::UserRepository;

/// Wraps a decode failure the way sqlx reports column decode errors.
fn decode_error(reason: impl Into<String>) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        reason.into(),
    )))
}
