//! tallybot - long-polling runtime
//!
//! Usage:
//!   cargo run --release --bin tallybot
//!
//! Environment variables (see `BotConfig`):
//!   TELEGRAM_BOT_TOKEN - bot token (required)
//!   TALLYBOT_DB_PATH - SQLite database path (default: analytics.db)
//!   TALLYBOT_SCRATCH_DIR - chart/CSV scratch directory (default: temp_charts)
//!   TALLYBOT_SEED_DEMO - replace sales with demo data on start (default: false)

use dotenv::dotenv;
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tallybot::bot::{run_polling, Dispatcher, SessionManager};
use tallybot::config::BotConfig;
use tallybot::context::ServiceContext;
use tallybot::delivery::{RetryingSender, ScratchDir, TelegramClient, Transport};
use tallybot::store::{seed::seed_demo_sales, EventStore, SqliteEventStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    info!("🚀 tallybot v{}", env!("CARGO_PKG_VERSION"));

    let config = BotConfig::from_env()?;
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Scratch dir: {}", config.scratch_dir);
    info!(
        "   ├─ Send retries: {} (initial delay {}ms)",
        config.max_send_attempts, config.initial_delay_ms
    );
    info!("   └─ Currency: {}", config.currency);

    info!("🔧 Opening event store...");
    let store: Arc<dyn EventStore> = Arc::new(SqliteEventStore::open(&config.db_path)?);
    info!("✅ Event store ready");

    if config.seed_demo_data {
        let today = chrono::Local::now().date_naive();
        let mut rng = StdRng::from_entropy();
        seed_demo_sales(store.as_ref(), today, &mut rng).await?;
    }

    let scratch = ScratchDir::new(&config.scratch_dir);
    let leftovers = scratch.prepare()?;
    info!("✅ Scratch dir ready ({} leftover file(s) removed)", leftovers);

    let client = Arc::new(TelegramClient::new(
        &config.api_url,
        &config.bot_token,
        config.api_timeout(),
    )?);
    let transport: Arc<dyn Transport> = client.clone();

    let ctx = Arc::new(ServiceContext {
        store,
        sender: RetryingSender::new(transport, config.retry_policy()),
        scratch: scratch.clone(),
        currency: config.currency.clone(),
    });
    let dispatcher = Arc::new(Dispatcher::new(ctx, Arc::new(SessionManager::new())));

    info!("🔄 Press CTRL+C to shutdown gracefully");

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("");
                info!("⚠️  Received CTRL+C, shutting down...");
            }
            Err(err) => {
                error!("❌ Failed to listen for CTRL+C: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };
    run_polling(client, dispatcher, config.poll_timeout_secs, shutdown).await;

    let removed = scratch.clear();
    info!("🧹 Removed {} scratch file(s)", removed);
    info!("✅ tallybot stopped");
    Ok(())
}
