use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use warden::{
    api::{create_router, AppState},
    audit::TracingAuditStorage,
    clock::SystemClock,
    config::Config,
    observability::init_tracing,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize tracing/logging
    init_tracing(&config.observability);

    // Refuse to start on unsafe configuration (missing production secret etc.)
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    tracing::info!(environment = config.environment.as_str(), "Starting Warden service");
    tracing::info!("Configuration loaded: {:?}", config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let eviction_interval = Duration::from_secs(config.rate_limit.eviction_interval_seconds.max(1));

    let state = AppState::from_config(
        config,
        Arc::new(SystemClock),
        Arc::new(TracingAuditStorage),
    )
    .await?;

    // Periodic sweep of stale throttle, rate limit and revocation entries
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(eviction_interval);
        loop {
            ticker.tick().await;
            match sweeper.evict_expired().await {
                Ok(0) => {}
                Ok(evicted) => tracing::debug!(evicted, "Evicted stale entries"),
                Err(e) => tracing::warn!(error = %e, "Eviction sweep failed"),
            }
        }
    });

    let app = create_router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Warden service is ready to accept requests");

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
