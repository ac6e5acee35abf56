//! services/watcher/src/bin/watcher.rs

use clap::Parser;
use slot_watcher_core::poll::PollLoop;
use slot_watcher_core::ports::{ConfigStore, NotificationSink};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use watcher_lib::{
    adapters::{NotifyRunSink, SqliteStore, WebDriverSampler},
    cli::{Cli, Command},
    config::Config,
    error::WatcherError,
};

#[tokio::main]
async fn main() -> Result<(), WatcherError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- 2. Open the Database & Run Migrations ---
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(SqliteStore::new(pool));
    store.run_migrations().await?;

    // --- 3. Dispatch the Command ---
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_watch_loop(&config, store).await,
        Command::Register => {
            let endpoint = ensure_endpoint(&config, reqwest::Client::new(), &store).await?;
            println!("Subscription endpoint: {endpoint}");
            println!("Open it on the device that should receive notifications.");
            Ok(())
        }
        Command::SetInterval { seconds } => {
            store
                .set_refresh_interval(Duration::from_secs(seconds))
                .await?;
            println!("Refresh interval set to {seconds} seconds");
            Ok(())
        }
        Command::History { limit } => {
            let records = store.recent_history(limit).await?;
            if records.is_empty() {
                println!("No notifications sent yet");
            }
            for record in records {
                println!(
                    "{}  {}",
                    record.sent_at.format("%Y-%m-%d %H:%M:%S"),
                    record.message
                );
            }
            Ok(())
        }
        Command::ClearHistory => {
            store.clear_history().await?;
            println!("Notification history cleared");
            Ok(())
        }
    }
}

/// Returns the stored subscription endpoint, registering and persisting a
/// new one if none exists yet.
async fn ensure_endpoint(
    config: &Config,
    http: reqwest::Client,
    store: &Arc<SqliteStore>,
) -> Result<String, WatcherError> {
    let stored = store.subscription_endpoint().await?;
    let sink = NotifyRunSink::new(http, config.notify_api_url.clone(), stored);
    let endpoint = sink.register_endpoint().await?;
    store.set_subscription_endpoint(&endpoint).await?;
    Ok(endpoint)
}

async fn run_watch_loop(config: &Config, store: Arc<SqliteStore>) -> Result<(), WatcherError> {
    let http = reqwest::Client::new();

    let endpoint = ensure_endpoint(config, http.clone(), &store).await?;
    info!(endpoint = %endpoint, "notifications will be delivered to the subscription endpoint");
    let sink = Arc::new(NotifyRunSink::new(
        http.clone(),
        config.notify_api_url.clone(),
        Some(endpoint),
    ));

    let sampler = Arc::new(
        WebDriverSampler::connect(
            http,
            &config.webdriver_url,
            config.slot_page_url.clone(),
            config.settle_delay,
        )
        .await?,
    );

    // Ctrl-C finishes the current cycle, then stops cleanly.
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down after the current cycle");
            signal_token.cancel();
        }
    });

    let poll = PollLoop::new(sampler, sink, store);
    poll.run(shutdown).await?;
    Ok(())
}
