//! Core domain types and utilities for parley.
//!
//! This crate provides the identifier types and the error-handling alias
//! shared by the conversation, provider and server crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ChatId, MessageId, ParseIdError, TurnId, UserId};
