//! User and preference repository.

use super::decode_error;
use crate::error::store_error;
use async_trait::async_trait;
use parley_ai::{Persona, Provider};
use parley_conversation::{Preferences, SettingsStore, StoreError, UserProfile};
use parley_core::UserId;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::instrument;

/// Row type for preference queries.
#[derive(FromRow)]
struct PreferencesRow {
    ai_provider: String,
    persona: String,
    temperature: f32,
    max_tokens: i32,
}

impl PreferencesRow {
    fn try_into_preferences(self) -> Result<Preferences, sqlx::Error> {
        let provider = Provider::from_str(&self.ai_provider).map_err(decode_error)?;
        let persona = Persona::from_str(&self.persona).map_err(|e| decode_error(e.to_string()))?;
        let max_tokens = u32::try_from(self.max_tokens)
            .map_err(|_| decode_error(format!("invalid max_tokens {}", self.max_tokens)))?;
        Ok(Preferences {
            provider,
            persona,
            temperature: self.temperature,
            max_tokens,
        })
    }
}

fn max_tokens_column(preferences: &Preferences) -> i32 {
    i32::try_from(preferences.max_tokens).unwrap_or(i32::MAX)
}

/// Repository for user operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for UserRepository {
    #[instrument(skip(self, profile), fields(user_id = %user_id))]
    async fn upsert_user(&self, user_id: UserId, profile: &UserProfile) -> Result<(), StoreError> {
        let defaults = Preferences::default();
        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, first_name, last_name,
                               ai_provider, persona, temperature, max_tokens,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET username = EXCLUDED.username,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                updated_at = NOW()
            "#,
        )
        .bind(user_id.get())
        .bind(profile.username.as_deref())
        .bind(profile.first_name.as_deref())
        .bind(profile.last_name.as_deref())
        .bind(defaults.provider.as_str())
        .bind(defaults.persona.as_str())
        .bind(defaults.temperature)
        .bind(max_tokens_column(&defaults))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn preferences(&self, user_id: UserId) -> Result<Option<Preferences>, StoreError> {
        let row: Option<PreferencesRow> = sqlx::query_as(
            r#"
            SELECT ai_provider, persona, temperature, max_tokens
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        match row {
            Some(r) => Ok(Some(r.try_into_preferences().map_err(store_error)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, preferences), fields(user_id = %user_id))]
    async fn save_preferences(
        &self,
        user_id: UserId,
        preferences: &Preferences,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, ai_provider, persona, temperature, max_tokens,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET ai_provider = EXCLUDED.ai_provider,
                persona = EXCLUDED.persona,
                temperature = EXCLUDED.temperature,
                max_tokens = EXCLUDED.max_tokens,
                updated_at = NOW()
            "#,
        )
        .bind(user_id.get())
        .bind(preferences.provider.as_str())
        .bind(preferences.persona.as_str())
        .bind(preferences.temperature)
        .bind(max_tokens_column(preferences))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
