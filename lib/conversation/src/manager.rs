//! Session manager.
//!
//! Owns the per-user conversation flow: resolving preferences, assembling
//! the working context, dispatching to the selected provider and recording
//! the resulting turn. All state-changing operations for a user are
//! serialized through [`UserLocks`].

use crate::error::StoreError;
use crate::lock::UserLocks;
use crate::preferences::{Preferences, UserProfile};
use crate::session::{InMemorySessionStore, Session, SessionStore};
use crate::store::{HistoryStore, SettingsStore};
use crate::turn::Turn;
use chrono::{DateTime, Utc};
use parley_ai::{
    ChatMessage, ContextSource, Persona, Provider, ProviderError, ProviderRegistry, TokenUsage,
};
use parley_core::UserId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Tunables for the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// How many prior turns are kept in the working context.
    #[serde(default = "default_window_turns")]
    pub window_turns: usize,
}

fn default_window_turns() -> usize {
    6
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            window_turns: default_window_turns(),
        }
    }
}

/// A successful completion, ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// The assistant's text.
    pub content: String,
    /// Token accounting, when the provider reported it.
    pub usage: Option<TokenUsage>,
    /// Which provider answered.
    pub provider: Provider,
}

/// Per-user history summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversationStats {
    pub total_turns: u64,
    pub per_provider: BTreeMap<Provider, u64>,
    pub first_turn_at: Option<DateTime<Utc>>,
}

/// Process-wide counters for the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub users: u64,
    pub turns: u64,
    pub active_sessions: usize,
    pub uptime_secs: u64,
}

/// Builds the exact message list sent to a provider.
///
/// The result is the persona's system prompt, then each prior turn as a
/// user/assistant pair in the order given, then the new user message.
#[must_use]
pub fn assemble_context<'a>(
    persona: Persona,
    history: impl IntoIterator<Item = &'a Turn>,
    text: &str,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(persona.system_prompt())];
    messages.extend(history.into_iter().flat_map(Turn::messages));
    messages.push(ChatMessage::user(text));
    messages
}

/// Coordinates sessions, stores and providers for every user.
pub struct SessionManager {
    settings: Arc<dyn SettingsStore>,
    history: Arc<dyn HistoryStore>,
    providers: ProviderRegistry,
    sessions: Arc<dyn SessionStore>,
    locks: UserLocks,
    config: ConversationConfig,
    started_at: Instant,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("providers", &self.providers)
            .field("config", &self.config)
            .field("active_sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a manager with a fresh in-memory session store.
    #[must_use]
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        history: Arc<dyn HistoryStore>,
        providers: ProviderRegistry,
        config: ConversationConfig,
    ) -> Self {
        Self {
            settings,
            history,
            providers,
            sessions: Arc::new(InMemorySessionStore::new()),
            locks: UserLocks::new(),
            config,
            started_at: Instant::now(),
        }
    }

    /// Replaces the session store.
    #[must_use]
    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Returns the configured providers.
    #[must_use]
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Returns the manager's tunables.
    #[must_use]
    pub fn config(&self) -> ConversationConfig {
        self.config
    }

    /// Returns a copy of the user's live session, if any.
    #[must_use]
    pub fn session(&self, user_id: UserId) -> Option<Session> {
        self.sessions.get(user_id)
    }

    /// Makes sure the user has a live session and a durable record.
    ///
    /// Safe to call on every interaction; nothing is duplicated and
    /// existing preferences are never overwritten.
    #[instrument(skip(self, profile), fields(user_id = %user_id))]
    pub async fn ensure_session(&self, user_id: UserId, profile: Option<&UserProfile>) {
        let _guard = self.locks.lock(user_id).await;
        self.ensure_session_locked(user_id, profile).await;
    }

    async fn ensure_session_locked(&self, user_id: UserId, profile: Option<&UserProfile>) {
        // `None` means the record could not be read; only a supplied profile
        // is written then, so existing metadata is never blanked.
        let known = match self.settings.preferences(user_id).await {
            Ok(prefs) => Some(prefs.is_some()),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to read preferences");
                None
            }
        };

        let profile = match (known, profile) {
            (_, Some(profile)) => Some(profile.clone()),
            (Some(false), None) => Some(UserProfile::default()),
            _ => None,
        };
        if let Some(profile) = profile {
            if let Err(e) = self.settings.upsert_user(user_id, &profile).await {
                warn!(user_id = %user_id, error = %e, "Failed to upsert user");
            } else if known == Some(false) {
                info!(user_id = %user_id, "Registered new user");
            }
        }

        if self.sessions.get(user_id).is_none() {
            let window = self.config.window_turns;
            let history = self
                .history
                .recent_turns(user_id, window)
                .await
                .unwrap_or_else(|e| {
                    warn!(user_id = %user_id, error = %e, "Failed to load recent turns");
                    Vec::new()
                });
            debug!(user_id = %user_id, turns = history.len(), "Hydrated session");
            self.sessions
                .put(Session::hydrated(user_id, window, history));
        }
    }

    /// Resolves the user's effective preferences.
    ///
    /// Missing records and store failures both yield defaults.
    pub async fn preferences(&self, user_id: UserId) -> Preferences {
        match self.settings.preferences(user_id).await {
            Ok(prefs) => prefs.unwrap_or_default(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to read preferences, using defaults");
                Preferences::default()
            }
        }
    }

    /// Runs one conversational turn.
    ///
    /// On failure nothing is recorded and the provider's error is returned
    /// unchanged.
    #[instrument(skip(self, text), fields(user_id = %user_id))]
    pub async fn converse(&self, user_id: UserId, text: &str) -> Result<Reply, ProviderError> {
        let _guard = self.locks.lock(user_id).await;
        self.ensure_session_locked(user_id, None).await;

        let prefs = self.preferences(user_id).await;
        let window = self.config.window_turns;
        let mut session = self
            .sessions
            .get(user_id)
            .unwrap_or_else(|| Session::new(user_id, window));

        let messages = match prefs.provider.context_source() {
            ContextSource::InMemory => assemble_context(prefs.persona, session.turns(), text),
            ContextSource::Durable => {
                let history = self
                    .history
                    .recent_turns(user_id, window)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(user_id = %user_id, error = %e, "Failed to load history for context");
                        Vec::new()
                    });
                assemble_context(prefs.persona, &history, text)
            }
        };

        let adapter = self.providers.get(prefs.provider)?;
        debug!(
            user_id = %user_id,
            provider = %prefs.provider,
            messages = messages.len(),
            "Dispatching completion"
        );
        let completion = adapter
            .complete(&messages, &prefs.completion_params())
            .await
            .inspect_err(|e| warn!(user_id = %user_id, error = %e, "Completion failed"))?;

        let turn = Turn::new(user_id, text, completion.content.clone(), prefs.provider);
        session.push(turn.clone());
        self.sessions.put(session);
        if let Err(e) = self.history.append_turn(&turn).await {
            warn!(user_id = %user_id, error = %e, "Failed to persist turn");
        }

        Ok(Reply {
            content: completion.content,
            usage: completion.usage,
            provider: prefs.provider,
        })
    }

    /// Empties the user's working window. Durable history is untouched.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn reset_session(&self, user_id: UserId) {
        let _guard = self.locks.lock(user_id).await;
        // Kept empty rather than removed so the next message does not
        // re-hydrate the window from history.
        let mut session = self
            .sessions
            .get(user_id)
            .unwrap_or_else(|| Session::new(user_id, self.config.window_turns));
        session.clear();
        self.sessions.put(session);
        info!(user_id = %user_id, "Session reset");
    }

    /// Summarizes the user's durable history.
    pub async fn stats(&self, user_id: UserId) -> ConversationStats {
        let per_provider = match self.history.count_turns_by_provider(user_id).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to count turns");
                return ConversationStats::default();
            }
        };
        let first_turn_at = self
            .history
            .first_turn_at(user_id)
            .await
            .unwrap_or_else(|e| {
                warn!(user_id = %user_id, error = %e, "Failed to read first turn");
                None
            });

        ConversationStats {
            total_turns: per_provider.values().sum(),
            per_provider,
            first_turn_at,
        }
    }

    /// Deletes all durable turns for the user. Returns whether the store
    /// accepted the request.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear_history(&self, user_id: UserId) -> bool {
        let _guard = self.locks.lock(user_id).await;
        match self.history.delete_all_turns(user_id).await {
            Ok(deleted) => {
                info!(user_id = %user_id, deleted, "History cleared");
                true
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to clear history");
                false
            }
        }
    }

    /// Applies a change to the user's preferences and persists it.
    pub async fn update_preferences<F>(
        &self,
        user_id: UserId,
        change: F,
    ) -> Result<Preferences, StoreError>
    where
        F: FnOnce(&mut Preferences) + Send,
    {
        let _guard = self.locks.lock(user_id).await;
        let mut prefs = self.settings.preferences(user_id).await?.unwrap_or_default();
        change(&mut prefs);
        self.settings.save_preferences(user_id, &prefs).await?;
        Ok(prefs)
    }

    /// Aggregates process-wide counters.
    pub async fn status(&self) -> StatusReport {
        let users = self.settings.count_users().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to count users");
            0
        });
        let turns = self.history.count_turns().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to count turns");
            0
        });

        StatusReport {
            users,
            turns,
            active_sessions: self.sessions.len(),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}
