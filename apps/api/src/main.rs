mod config;
mod document;
mod driver;
mod errors;
mod measure;
mod pagination;
mod routes;
mod sessions;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::measure::{default_text_metrics, EstimatingMeasurer};
use crate::routes::build_router;
use crate::state::{spawn_session_sweeper, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Pagination API v{}", env!("CARGO_PKG_VERSION"));

    // Server-side measurement: text estimation with the configured font
    let mut metrics = default_text_metrics(config.measure_font);
    metrics.font_size_px = config.measure_font_size_px;
    info!(
        "Measurement config: {:?} {}px, debounce {}ms",
        metrics.font,
        metrics.font_size_px,
        config.debounce.as_millis()
    );
    let measurer = Arc::new(EstimatingMeasurer::new(metrics));

    let state = AppState::new(config.clone(), measurer);
    spawn_session_sweeper(state.clone(), config.session_idle_ttl);
    info!("Idle sessions close after {}s", config.session_idle_ttl.as_secs());

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the editor host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
