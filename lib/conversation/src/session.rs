//! In-memory conversation sessions.
//!
//! A session is the sliding window of recent turns used to build prompt
//! context. Sessions are ephemeral: the [`SessionStore`] is created empty at
//! process start and dropped at shutdown, and durable history survives
//! independently in the history store.

use crate::turn::Turn;
use chrono::{DateTime, Utc};
use parley_core::UserId;
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};

/// A user's working context.
#[derive(Debug, Clone)]
pub struct Session {
    /// The user who owns this session.
    pub user_id: UserId,
    window: usize,
    turns: VecDeque<Turn>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session last changed.
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session holding at most `window` turns.
    #[must_use]
    pub fn new(user_id: UserId, window: usize) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            window,
            turns: VecDeque::with_capacity(window),
            created_at: now,
            last_active_at: now,
        }
    }

    /// Creates a session pre-filled from durable history (oldest first).
    #[must_use]
    pub fn hydrated(user_id: UserId, window: usize, history: Vec<Turn>) -> Self {
        let mut session = Self::new(user_id, window);
        for turn in history {
            session.push(turn);
        }
        session
    }

    /// Appends a turn, evicting the oldest ones beyond the window.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.window {
            self.turns.pop_front();
        }
        self.last_active_at = Utc::now();
    }

    /// Drops every turn from the window.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.last_active_at = Utc::now();
    }

    /// Returns the turns in chronological order.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Returns the number of turns in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns the window capacity.
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }
}

/// Storage for live sessions.
pub trait SessionStore: Send + Sync {
    /// Returns a copy of the user's session, if one exists.
    fn get(&self, user_id: UserId) -> Option<Session>;

    /// Stores a session, replacing any existing one for the same user.
    fn put(&self, session: Session);

    /// Returns the number of live sessions.
    fn len(&self) -> usize;

    /// Returns whether there are no live sessions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local session storage.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<UserId, Session>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, user_id: UserId) -> Option<Session> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .cloned()
    }

    fn put(&self, session: Session) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.user_id, session);
    }

    fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
