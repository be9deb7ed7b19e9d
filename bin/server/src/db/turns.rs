//! Conversation history repository.

use super::decode_error;
use crate::error::store_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_ai::Provider;
use parley_conversation::{HistoryStore, StoreError, Turn};
use parley_core::{TurnId, UserId};
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, instrument};

/// Row type for turn queries.
#[derive(FromRow)]
struct TurnRow {
    id: String,
    user_id: i64,
    message: String,
    response: String,
    ai_provider: String,
    created_at: DateTime<Utc>,
}

impl TurnRow {
    fn try_into_turn(self) -> Result<Turn, sqlx::Error> {
        let id = TurnId::from_str(&self.id)
            .map_err(|e| decode_error(format!("invalid turn id '{}': {}", self.id, e)))?;
        let provider = Provider::from_str(&self.ai_provider).map_err(decode_error)?;
        Ok(Turn {
            id,
            user_id: UserId::new(self.user_id),
            user_message: self.message,
            assistant_response: self.response,
            provider,
            created_at: self.created_at,
        })
    }
}

/// Row type for per-provider counts.
#[derive(FromRow)]
struct ProviderCountRow {
    ai_provider: String,
    count: i64,
}

/// Repository for the turn log.
#[derive(Clone)]
pub struct TurnRepository {
    pool: PgPool,
}

impl TurnRepository {
    /// Creates a new turn repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for TurnRepository {
    #[instrument(skip(self, turn), fields(user_id = %turn.user_id, turn_id = %turn.id))]
    async fn append_turn(&self, turn: &Turn) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO turns (id, user_id, message, response, ai_provider, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(turn.id.to_string())
        .bind(turn.user_id.get())
        .bind(&turn.user_message)
        .bind(&turn.assistant_response)
        .bind(turn.provider.as_str())
        .bind(turn.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn recent_turns(&self, user_id: UserId, limit: usize) -> Result<Vec<Turn>, StoreError> {
        let rows: Vec<TurnRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, message, response, ai_provider, created_at
            FROM (
                SELECT id, user_id, message, response, ai_provider, created_at
                FROM turns
                WHERE user_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
            ) recent
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id.get())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter()
            .map(|r| r.try_into_turn().map_err(store_error))
            .collect()
    }

    async fn count_turns_by_provider(
        &self,
        user_id: UserId,
    ) -> Result<BTreeMap<Provider, u64>, StoreError> {
        let rows: Vec<ProviderCountRow> = sqlx::query_as(
            r#"
            SELECT ai_provider, COUNT(*) AS count
            FROM turns
            WHERE user_id = $1
            GROUP BY ai_provider
            "#,
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let provider = Provider::from_str(&row.ai_provider)
                .map_err(|reason| StoreError::InvalidData { reason })?;
            counts.insert(provider, u64::try_from(row.count).unwrap_or_default());
        }
        Ok(counts)
    }

    async fn first_turn_at(&self, user_id: UserId) -> Result<Option<DateTime<Utc>>, StoreError> {
        let (first,): (Option<DateTime<Utc>>,) =
            sqlx::query_as("SELECT MIN(created_at) FROM turns WHERE user_id = $1")
                .bind(user_id.get())
                .fetch_one(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(first)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn delete_all_turns(&self, user_id: UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM turns WHERE user_id = $1")
            .bind(user_id.get())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        debug!(deleted = result.rows_affected(), "Deleted turns");
        Ok(result.rows_affected())
    }

    async fn count_turns(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM turns")
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: String, provider: &str) -> TurnRow {
        TurnRow {
            id,
            user_id: 42,
            message: "q".to_string(),
            response: "a".to_string(),
            ai_provider: provider.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn decodes_stored_turn() {
        let id = TurnId::new();
        let turn = row(id.to_string(), "openai").try_into_turn().unwrap();

        assert_eq!(turn.id, id);
        assert_eq!(turn.user_id, UserId::new(42));
        assert_eq!(turn.provider, Provider::OpenAi);
        assert_eq!(turn.user_message, "q");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = row(TurnId::new().to_string(), "gemini")
            .try_into_turn()
            .unwrap_err();
        assert!(err.to_string().contains("unknown provider"));
    }

    #[test]
    fn invalid_id_is_rejected() {
        assert!(row("not-a-ulid".to_string(), "openai").try_into_turn().is_err());
    }
}
