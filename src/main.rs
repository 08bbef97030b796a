mod config;
mod error;
mod models;
mod services;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::services::{
    classifier::TargetFilter,
    fetcher::HttpSourceFetcher,
    notifier::{Notifier, TelegramNotifier},
    pipeline::Pipeline,
    prober::{AlwaysLive, HttpProber, StreamProbe},
    snapshot::SnapshotWriter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iptv_aggregator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();

    tracing::info!("Starting IPTV build v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Sources: {}", config.sources.len());

    let fetcher = HttpSourceFetcher::new(
        &config.user_agent,
        config.fetch_timeout_ms,
        config.fetch_max_retries,
        config.max_m3u_size_mb,
    )?;

    let prober: Box<dyn StreamProbe> = if config.probe_enabled {
        Box::new(HttpProber::new(&config.user_agent, config.probe_timeout_ms)?)
    } else {
        tracing::info!("Liveness probing disabled");
        Box::new(AlwaysLive)
    };

    let target_filter = TargetFilter::new(&config.target_channels);
    if target_filter.is_active() {
        tracing::info!("Target filter: {} names", config.target_channels.len());
    }

    let writer = SnapshotWriter::new(&config.output_file, &config.summary_file);
    tracing::info!("Output: {}", writer.playlist_path().display());

    let pipeline = Pipeline::new(
        config.sources.clone(),
        Box::new(fetcher),
        prober,
        config.probe_concurrency,
        writer,
    )
    .with_target_filter(target_filter);

    let outcome = match pipeline.run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(fatal = e.is_fatal(), "Run failed: {}", e);
            return Err(e.into());
        }
    };

    // Notification is best-effort; a broken client must not fail the run
    match TelegramNotifier::new(
        config.telegram_token.clone(),
        config.telegram_chat_id.clone(),
        config.notify_timeout_ms,
    ) {
        Ok(notifier) => notifier.notify(outcome.total, outcome.changed).await,
        Err(e) => tracing::warn!("Notifier unavailable: {}", e),
    }

    tracing::info!(stats = ?outcome.stats, changed = outcome.changed, "Process completed");

    Ok(())
}
