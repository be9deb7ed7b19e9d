//! Durable store interfaces.
//!
//! Two narrow interfaces separate what the session manager needs from how a
//! backend stores it: [`SettingsStore`] for users and their preferences, and
//! [`HistoryStore`] for the append-only turn log. [`InMemoryStore`]
//! implements both for deployments without a database and for tests.

use crate::error::StoreError;
use crate::preferences::{Preferences, UserProfile};
use crate::turn::Turn;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_ai::Provider;
use parley_core::UserId;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// Trait for user and preference storage.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Creates the user with default preferences, or overwrites the display
    /// metadata of an existing user. Never touches existing preferences.
    async fn upsert_user(&self, user_id: UserId, profile: &UserProfile) -> Result<(), StoreError>;

    /// Returns the user's preferences, or `None` for an unknown user.
    async fn preferences(&self, user_id: UserId) -> Result<Option<Preferences>, StoreError>;

    /// Persists preferences, creating a bare user record if needed.
    async fn save_preferences(
        &self,
        user_id: UserId,
        preferences: &Preferences,
    ) -> Result<(), StoreError>;

    /// Returns the number of known users.
    async fn count_users(&self) -> Result<u64, StoreError>;
}

/// Trait for the append-only turn log.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends a turn.
    async fn append_turn(&self, turn: &Turn) -> Result<(), StoreError>;

    /// Returns up to `limit` most recent turns, oldest first.
    async fn recent_turns(&self, user_id: UserId, limit: usize) -> Result<Vec<Turn>, StoreError>;

    /// Returns the user's turn count per provider.
    async fn count_turns_by_provider(
        &self,
        user_id: UserId,
    ) -> Result<BTreeMap<Provider, u64>, StoreError>;

    /// Returns the timestamp of the user's earliest turn.
    async fn first_turn_at(&self, user_id: UserId) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Deletes every turn of the user and returns how many were removed.
    async fn delete_all_turns(&self, user_id: UserId) -> Result<u64, StoreError>;

    /// Returns the number of turns across all users.
    async fn count_turns(&self) -> Result<u64, StoreError>;
}

/// Process-local implementation of both store interfaces.
///
/// Only preferences are kept per user; display metadata is discarded.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<UserId, Preferences>>,
    turns: RwLock<HashMap<UserId, Vec<Turn>>>,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable {
        reason: "in-memory store lock poisoned".to_string(),
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for InMemoryStore {
    async fn upsert_user(&self, user_id: UserId, _profile: &UserProfile) -> Result<(), StoreError> {
        self.users
            .write()
            .map_err(poisoned)?
            .entry(user_id)
            .or_default();
        Ok(())
    }

    async fn preferences(&self, user_id: UserId) -> Result<Option<Preferences>, StoreError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(&user_id).copied())
    }

    async fn save_preferences(
        &self,
        user_id: UserId,
        preferences: &Preferences,
    ) -> Result<(), StoreError> {
        self.users
            .write()
            .map_err(poisoned)?
            .insert(user_id, *preferences);
        Ok(())
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(self.users.read().map_err(poisoned)?.len() as u64)
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn append_turn(&self, turn: &Turn) -> Result<(), StoreError> {
        let mut turns = self.turns.write().map_err(poisoned)?;
        let log = turns.entry(turn.user_id).or_default();
        log.push(turn.clone());
        log.sort_by_key(|t| (t.created_at, t.id));
        Ok(())
    }

    async fn recent_turns(&self, user_id: UserId, limit: usize) -> Result<Vec<Turn>, StoreError> {
        let turns = self.turns.read().map_err(poisoned)?;
        let log = turns.get(&user_id).map(Vec::as_slice).unwrap_or_default();
        let start = log.len().saturating_sub(limit);
        Ok(log[start..].to_vec())
    }

    async fn count_turns_by_provider(
        &self,
        user_id: UserId,
    ) -> Result<BTreeMap<Provider, u64>, StoreError> {
        let turns = self.turns.read().map_err(poisoned)?;
        let mut counts = BTreeMap::new();
        for turn in turns.get(&user_id).into_iter().flatten() {
            *counts.entry(turn.provider).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn first_turn_at(&self, user_id: UserId) -> Result<Option<DateTime<Utc>>, StoreError> {
        let turns = self.turns.read().map_err(poisoned)?;
        Ok(turns
            .get(&user_id)
            .and_then(|log| log.first())
            .map(|t| t.created_at))
    }

    async fn delete_all_turns(&self, user_id: UserId) -> Result<u64, StoreError> {
        let mut turns = self.turns.write().map_err(poisoned)?;
        Ok(turns.remove(&user_id).map_or(0, |log| log.len() as u64))
    }

    async fn count_turns(&self) -> Result<u64, StoreError> {
        let turns = self.turns.read().map_err(poisoned)?;
        Ok(turns.values().map(|log| log.len() as u64).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use parley_ai::Persona;

    #[tokio::test]
    async fn upsert_seeds_defaults_once() {
        let store = InMemoryStore::new();
        let user = UserId::new(1);

        assert_eq!(store.preferences(user).await.unwrap(), None);
        store.upsert_user(user, &UserProfile::default()).await.unwrap();
        assert_eq!(
            store.preferences(user).await.unwrap(),
            Some(Preferences::default())
        );
    }

    #[tokio::test]
    async fn upsert_keeps_existing_preferences() {
        let store = InMemoryStore::new();
        let user = UserId::new(1);
        let custom = Preferences {
            provider: Provider::Perplexity,
            persona: Persona::Casual,
            ..Preferences::default()
        };

        store.save_preferences(user, &custom).await.unwrap();
        let profile = UserProfile {
            first_name: Some("Ada".to_string()),
            ..UserProfile::default()
        };
        store.upsert_user(user, &profile).await.unwrap();
        store.upsert_user(user, &profile).await.unwrap();

        assert_eq!(store.preferences(user).await.unwrap(), Some(custom));
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn recent_turns_are_bounded_and_chronological() {
        let store = InMemoryStore::new();
        let user = UserId::new(1);
        let base = Utc::now();

        // Appended out of order on purpose.
        for n in [3, 0, 4, 1, 2] {
            let turn = Turn::new(user, format!("q{n}"), "a", Provider::OpenAi)
                .at(base + Duration::seconds(n));
            store.append_turn(&turn).await.unwrap();
        }

        let recent = store.recent_turns(user, 3).await.unwrap();
        let order: Vec<&str> = recent.iter().map(|t| t.user_message.as_str()).collect();
        assert_eq!(order, vec!["q2", "q3", "q4"]);
        assert_eq!(store.first_turn_at(user).await.unwrap(), Some(base));
    }

    #[tokio::test]
    async fn counts_and_deletes_per_user() {
        let store = InMemoryStore::new();
        let alice = UserId::new(1);
        let bob = UserId::new(2);

        store
            .append_turn(&Turn::new(alice, "q", "a", Provider::OpenAi))
            .await
            .unwrap();
        store
            .append_turn(&Turn::new(alice, "q", "a", Provider::Perplexity))
            .await
            .unwrap();
        store
            .append_turn(&Turn::new(bob, "q", "a", Provider::OpenAi))
            .await
            .unwrap();

        let counts = store.count_turns_by_provider(alice).await.unwrap();
        assert_eq!(counts.get(&Provider::OpenAi), Some(&1));
        assert_eq!(counts.get(&Provider::Perplexity), Some(&1));
        assert_eq!(store.count_turns().await.unwrap(), 3);

        assert_eq!(store.delete_all_turns(alice).await.unwrap(), 2);
        assert_eq!(store.delete_all_turns(alice).await.unwrap(), 0);
        assert_eq!(store.count_turns().await.unwrap(), 1);
        assert!(store.recent_turns(alice, 6).await.unwrap().is_empty());
    }
}
