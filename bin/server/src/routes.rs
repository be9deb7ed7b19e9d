//! HTTP routes: Telegram webhook delivery and health.

use crate::bot::Bot;
use crate::telegram::Update;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Shared application state.
pub struct AppState {
    /// Event dispatcher.
    pub bot: Arc<Bot>,
    /// Secret path segment Telegram posts updates to.
    pub webhook_token: String,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(bot: Arc<Bot>, webhook_token: impl Into<String>) -> Self {
        Self {
            bot,
            webhook_token: webhook_token.into(),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/{token}", post(webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Accepts an update and handles it in the background.
///
/// Malformed updates are acknowledged so Telegram stops redelivering them.
async fn webhook(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    body: Bytes,
) -> StatusCode {
    if token != state.webhook_token {
        return StatusCode::NOT_FOUND;
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "Dropping malformed update");
            return StatusCode::OK;
        }
    };

    match update.into_event() {
        Some(event) => {
            let bot = Arc::clone(&state.bot);
            tokio::spawn(async move { bot.handle(event).await });
        }
        None => debug!("Ignoring update without a handled event"),
    }
    StatusCode::OK
}

#[derive(Debug, Serialize)]
struct DatabaseCounts {
    users: u64,
    turns: u64,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    uptime_secs: u64,
    active_sessions: usize,
    database: DatabaseCounts,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let report = state.bot.manager().status().await;
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
        uptime_secs: report.uptime_secs,
        active_sessions: report.active_sessions,
        database: DatabaseCounts {
            users: report.users,
            turns: report.turns,
        },
    })
}
