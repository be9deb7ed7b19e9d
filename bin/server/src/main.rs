use parley_conversation::{HistoryStore, InMemoryStore, SessionManager, SettingsStore};
use parley_server::{
    bot::Bot,
    config::ServerConfig,
    db::{TurnRepository, UserRepository},
    error::StartupError,
    outbound::Delivery,
    routes::{AppState, router},
    telegram::{TelegramClient, run_polling},
};
use rootcause::prelude::Report;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Stores = (Arc<dyn SettingsStore>, Arc<dyn HistoryStore>);

async fn connect_stores(database_url: Option<&str>) -> Result<Stores, Report<StartupError>> {
    let Some(database_url) = database_url else {
        tracing::warn!("No DATABASE_URL configured; history will not survive restarts");
        let store = Arc::new(InMemoryStore::new());
        let settings: Arc<dyn SettingsStore> = store.clone();
        let history: Arc<dyn HistoryStore> = store;
        return Ok((settings, history));
    };

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|e| StartupError::Database {
            details: e.to_string(),
        })?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .map_err(|e| StartupError::Migration {
            details: e.to_string(),
        })?;

    let settings: Arc<dyn SettingsStore> = Arc::new(UserRepository::new(db_pool.clone()));
    let history: Arc<dyn HistoryStore> = Arc::new(TurnRepository::new(db_pool));
    Ok((settings, history))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<(), Report<StartupError>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(|e| StartupError::Config {
        details: e.to_string(),
    })?;
    tracing::info!("Loaded configuration");

    let (settings, history) = connect_stores(config.database_url.as_deref()).await?;

    let providers = config
        .provider_registry()
        .map_err(|e| StartupError::Provider {
            details: e.to_string(),
        })?;
    if providers.providers().is_empty() {
        tracing::warn!("No completion providers configured; every message will fail");
    }
    tracing::info!(providers = ?providers.providers(), "Registered providers");

    let manager = Arc::new(SessionManager::new(
        settings,
        history,
        providers,
        config.conversation.manager_config(),
    ));
    let client = TelegramClient::new(&config.telegram);
    let bot = Arc::new(Bot::new(
        manager,
        Arc::new(client.clone()),
        Delivery {
            chunk_size: config.conversation.chunk_size,
            delay: config.conversation.chunk_delay(),
        },
    ));

    // A stale webhook blocks polling and a stale URL would receive updates.
    if let Err(e) = client.delete_webhook().await {
        tracing::warn!(error = %e, "Failed to remove previous webhook");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let poller = match &config.telegram.webhook_url {
        Some(webhook_url) => {
            let url = format!(
                "{}/webhook/{}",
                webhook_url.trim_end_matches('/'),
                config.telegram.bot_token
            );
            client
                .set_webhook(&url)
                .await
                .map_err(|e| StartupError::Webhook {
                    details: e.to_string(),
                })?;
            tracing::info!("Webhook registered");
            None
        }
        None => Some(tokio::spawn(run_polling(
            client.clone(),
            Arc::clone(&bot),
            shutdown_rx.clone(),
        ))),
    };

    let app = router(AppState::new(bot, config.telegram.bot_token.clone()));
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| StartupError::Bind {
            addr: config.bind_addr.to_string(),
            details: e.to_string(),
        })?;

    tracing::info!("listening on http://{}", config.bind_addr);

    let mut server_shutdown = shutdown_rx;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .map_err(|e| StartupError::Serve {
            details: e.to_string(),
        })?;

    if let Some(poller) = poller {
        if let Err(e) = poller.await {
            tracing::warn!(error = %e, "Polling task failed");
        }
    } else if let Err(e) = client.delete_webhook().await {
        tracing::warn!(error = %e, "Failed to remove webhook on shutdown");
    }

    tracing::info!("Shut down cleanly");
    Ok(())
}
