use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

mod app;
mod error;
mod http;
mod workerpool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "screenplay_engine=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit path > SCREENPLAY_CONFIG env > ~/.screenplay/screenplay.toml
    let config_path = std::env::var("SCREENPLAY_CONFIG").ok();
    let config = screenplay_core::config::ScreenplayConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({}), using defaults", e);
        screenplay_core::config::ScreenplayConfig::default()
    });

    let bind = config.server.bind.clone();
    let port = config.server.port;
    let state = Arc::new(app::AppState::new(config)?);

    // Background worker pool (spec §5): drains the three priority queues
    // behind a bounded semaphore, independent of the request-handling pool.
    workerpool::spawn(state.clone());

    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("screenplay-engine listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
