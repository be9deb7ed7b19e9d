//! Telegram Bot API transport.
//!
//! This module provides:
//! - Wire types for updates and keyboards, and their conversion into
//!   [`UserEvent`](crate::event::UserEvent)s
//! - A JSON client implementing [`Transport`](crate::outbound::Transport)
//! - The long-polling loop used when no webhook is configured

pub mod client;
pub mod polling;
pub mod types;

pub use client::{ALLOWED_UPDATES, TelegramClient};
pub use polling::run_polling;
pub use types::Update;
