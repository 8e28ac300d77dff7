//! Bazaar Server - Main Entry Point

use bazaar_common::{Clock, SystemClock};
use bazaar_server::{notifier, scheduler, ChannelNotifier, Marketplace, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Bazaar Server v{}", env!("CARGO_PKG_VERSION"));

    // Load config
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "/etc/bazaar/server.json".into());

    let config = ServerConfig::load(&config_path).unwrap_or_else(|err| {
        tracing::warn!(path = %config_path, error = %err, "Config not loaded, using defaults");
        ServerConfig::default()
    });

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (sales, sales_rx) = ChannelNotifier::channel(config.notification_queue);
    let consumer = notifier::spawn_consumer(sales_rx);
    let market = Marketplace::in_memory(&config, Arc::new(sales), clock.clone());

    let jobs = [
        scheduler::spawn_startup_sweep(market.sweeper.clone(), clock.clone(), config.startup_sweep_delay()),
        scheduler::spawn_daily_sweep(market.sweeper.clone(), clock.clone(), config.sweep_hour_utc),
        scheduler::spawn_limiter_cleanup(market.limiter.clone(), config.limiter_cleanup_interval()),
    ];
    tracing::info!(
        sweep_hour_utc = config.sweep_hour_utc,
        restock_on_cancel = config.ledger.restock_on_cancel,
        "Bazaar Server running"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    for job in &jobs {
        job.abort();
    }
    // Dropping the marketplace closes the notification channel
    drop(market);
    let handled = consumer.await?;
    tracing::info!(handled, "Bazaar Server stopped");

    Ok(())
}
