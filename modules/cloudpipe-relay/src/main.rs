mod config;
mod tail;

use anyhow::Result;
use cloudpipe_engine::EventSourcingEngine;
use cloudpipe_events::PgStreamStore;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::RelayConfig;
use crate::tail::TailHandler;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cloudpipe=info".parse()?))
        .init();

    info!("Cloudpipe relay starting...");

    let config = RelayConfig::from_env()?;

    // Pool size comes from config, so the runtime is built by hand.
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.engine.worker_threads)
        .enable_all()
        .build()?
        .block_on(run(config))
}

async fn run(config: RelayConfig) -> Result<()> {
    let pool = PgPool::connect(&config.database_url).await?;
    let store = PgStreamStore::new(pool);
    store.migrate().await?;

    let engine = EventSourcingEngine::new(store, config.engine.clone());

    for stream in &config.streams {
        engine
            .enable_handler(
                stream,
                config.start,
                TailHandler::new(stream),
                config.frequency,
                false,
            )
            .await?;
    }

    info!(handlers = ?engine.handler_names(), "Relay running");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    engine.shutdown().await;
    Ok(())
}
