use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ergon::api::create_router;
use ergon::common::{MarketConfig, StorageBackend};
use ergon::persistence::MemoryPersistence;
use ergon::service::Marketplace;

/// `RUST_LOG` 优先，其次是配置文件里的 logging.filter
fn init_tracing(config: &MarketConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_marketplace(config: &MarketConfig) -> anyhow::Result<Marketplace> {
    let builder = Marketplace::builder().with_config(config.clone());
    let market = match config.storage.backend {
        StorageBackend::Memory => builder.with_persistence(MemoryPersistence::new()).build(),
        #[cfg(feature = "distributed")]
        StorageBackend::Redis => {
            let redis = ergon::persistence::RedisPersistence::new(&config.storage)
                .context("failed to create redis persistence")?;
            builder.with_persistence(redis).build()
        }
        #[cfg(not(feature = "distributed"))]
        StorageBackend::Redis => anyhow::bail!("redis backend requires the `distributed` feature"),
    };
    Ok(market)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MarketConfig::load().context("failed to load configuration")?;
    init_tracing(&config);

    let market = build_marketplace(&config)?;
    let app = create_router(market);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    info!(
        addr = %config.server.bind_addr,
        backend = ?config.storage.backend,
        "Marketplace listening"
    );

    // 初始化全局停机 Token
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        signal.cancel();
    });

    let graceful = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { graceful.cancelled().await });

    let grace = Duration::from_secs(config.server.shutdown_timeout_secs);
    tokio::select! {
        res = server.into_future() => res.context("server error")?,
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(grace).await;
        } => warn!(timeout_secs = grace.as_secs(), "Graceful shutdown timed out"),
    }

    info!("Marketplace stopped");
    Ok(())
}
