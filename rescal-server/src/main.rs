mod routes;
mod singleton;
mod state;

use anyhow::{Context, Result};
use rescal_core::config::RescalConfig;
use rescal_core::db;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::state::AppState;

fn init_logging(default_filter: &str) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set up logging: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = RescalConfig::load()?;
    init_logging(&config.log_filter)?;

    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen))?;

    // Ensure only one instance is running
    let _lock = singleton::acquire_lock(&config.listen)?;

    let pool = db::connect(&config.database_url()).await?;
    let principal = config.principal.clone();
    let state = AppState::new(pool, config);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state).layer(cors);

    tracing::info!(%addr, principal, "rescal-server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
