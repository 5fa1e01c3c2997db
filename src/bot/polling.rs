//! Long-polling loop: one tokio task per update

use super::dispatcher::Dispatcher;
use crate::delivery::TelegramClient;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const POLL_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const POLL_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Consume updates until `shutdown` resolves
///
/// A failing or panicking update task never stops the loop.
pub async fn run_polling<S>(
    client: Arc<TelegramClient>,
    dispatcher: Arc<Dispatcher>,
    poll_timeout_secs: u64,
    shutdown: S,
) where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut offset: Option<i64> = None;
    let mut backoff = POLL_INITIAL_BACKOFF;

    log::info!("📡 Polling for updates (timeout {}s)", poll_timeout_secs);

    loop {
        let batch = tokio::select! {
            _ = &mut shutdown => {
                log::info!("🛑 Polling stopped");
                return;
            }
            batch = client.get_updates(offset, poll_timeout_secs) => batch,
        };

        match batch {
            Ok(updates) => {
                backoff = POLL_INITIAL_BACKOFF;
                for update in updates {
                    offset = Some(update.update_id + 1);
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(async move {
                        let id = update.update_id;
                        if let Err(e) = dispatcher.handle_update(update).await {
                            log::error!("❌ Update {} failed: {}", id, e);
                        }
                    });
                }
            }
            Err(e) => {
                log::warn!("⏳ Polling failed: {}. Retrying in {}s", e, backoff.as_secs());
                tokio::select! {
                    _ = &mut shutdown => {
                        log::info!("🛑 Polling stopped");
                        return;
                    }
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(POLL_MAX_BACKOFF);
            }
        }
    }
}
