//! Long-polling update loop, used when no webhook URL is configured.

use super::client::TelegramClient;
use crate::bot::Bot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Polls for updates until `shutdown` flips, spawning a task per event.
pub async fn run_polling(client: TelegramClient, bot: Arc<Bot>, mut shutdown: watch::Receiver<bool>) {
    info!("Polling for updates");
    let mut offset = 0;

    loop {
        let result = tokio::select! {
            _ = shutdown.changed() => break,
            result = client.get_updates(offset) => result,
        };

        match result {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    if let Some(event) = update.into_event() {
                        let bot = Arc::clone(&bot);
                        tokio::spawn(async move { bot.handle(event).await });
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Polling failed, retrying");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    () = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }

    info!("Polling stopped");
}
