//! Conversation service for parley.
//!
//! This crate provides:
//!
//! - **Session Manager**: context assembly, provider dispatch and turn
//!   persistence for each user
//! - **Stores**: the settings and history store interfaces plus an
//!   in-memory implementation
//! - **Preference Machine**: menu events applied to per-user preferences

pub mod error;
pub mod lock;
pub mod manager;
pub mod menu;
pub mod preferences;
pub mod session;
pub mod store;
pub mod turn;

pub use error::StoreError;
pub use lock::{UserGuard, UserLocks};
pub use manager::{
    ConversationConfig, ConversationStats, Reply, SessionManager, StatusReport, assemble_context,
};
pub use menu::{MenuEvent, MenuOutcome, PreferenceMachine};
pub use preferences::{Preferences, UserProfile};
pub use session::{InMemorySessionStore, Session, SessionStore};
pub use store::{HistoryStore, InMemoryStore, SettingsStore};
pub use turn::Turn;
