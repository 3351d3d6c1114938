mod cli;

use crate::cli::{LogFormat, CLI};
use anyhow::Context;
use clap::Parser;
use shorty_generator::UniqueIdGenerator;
use shorty_shortener::{DeletionPool, ShortenerService};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::try_parse()?;
    init_tracing(config.log_format);

    let backend = config.storage_backend();
    info!(
        base_url = %config.base_url,
        storage_backend = %backend,
        deletion_workers = config.deletion_workers,
        trusted_subnet = ?config.trusted_subnet.map(|subnet| subnet.to_string()),
        "starting shortener"
    );

    let repository = backend
        .open()
        .await
        .with_context(|| format!("failed to open {backend} storage"))?;
    if !repository.ping().await {
        warn!(storage_backend = %backend, "storage did not answer the ping");
    }

    let pool = DeletionPool::spawn(repository.clone(), config.pool_settings());
    let service = ShortenerService::new(
        repository.clone(),
        UniqueIdGenerator::random(),
        pool.queue(),
        config.base_url.as_str(),
    )
    .with_trusted_subnet(config.trusted_subnet);

    let stats = repository.stats().await?;
    info!(urls = stats.urls, users = stats.users, "shortener ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");

    drop(service);
    if tokio::time::timeout(config.shutdown_timeout(), pool.shutdown())
        .await
        .is_err()
    {
        warn!(
            timeout = ?config.shutdown_timeout(),
            "pending deletions did not finish in time"
        );
    }

    if let Err(err) = repository.close().await {
        error!(error = %err, "failed to close storage");
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
