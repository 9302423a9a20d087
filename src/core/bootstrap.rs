use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, fmt};

use crate::core::{app_state::AppState, config::Config, db};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

pub fn init_env() {
    if dotenvy::dotenv().is_err() {
        tracing::debug!("No .env file found, using process environment only");
    }
}

/// Connects the pool and assembles the shared state handed to every route.
pub async fn build_state(config: &Config) -> Result<AppState> {
    let db_pool = db::create_pool(&config.database).await?;
    Ok(AppState {
        db_pool,
        session: config.session.clone(),
    })
}

/// Serves `app` until the process receives Ctrl+C.
pub async fn bootstrap(
    service_name: &str,
    app: Router<AppState>,
    state: AppState,
    config: &Config,
) -> Result<()> {
    let app = app.layer(TraceLayer::new_for_http()).with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("{} listening on {}", service_name, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("{} stopped", service_name);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
    }
}
