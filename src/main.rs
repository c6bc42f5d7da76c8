mod client;
mod data;
mod display;
mod error;
mod fetcher;
mod handlers;
mod models;
mod operations;
mod state;
mod tools;

use anyhow::Context as _;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tera::Tera;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::client::HttpSource;
use crate::fetcher::WaveFetcher;
use crate::state::{AppState, Config};

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/wave-hacks/{id}", get(handlers::wave_hack_page))
        .route("/view-wave-cute", get(handlers::view_wave_cute))
        .route("/view-wave-cute-detail", get(handlers::view_wave_cute_detail))
        .route("/api/akindo-data", get(handlers::api_listings))
        .route("/api/wave-hack/{id}", get(handlers::api_wave_hack))
        .route("/mcp", post(tools::mcp))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wavecute=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Upstream {} (timeout {:?}, {} retries)",
        config.api_base, config.request_timeout, config.retry_limit
    );

    let tera = Tera::new(&config.template_glob)
        .with_context(|| format!("parsing templates from {}", config.template_glob))?;
    let source = HttpSource::new(&config).context("building upstream HTTP client")?;
    let fetcher = WaveFetcher::new(Arc::new(source));

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("binding {}", config.bind_address))?;
    let state = Arc::new(AppState::new(tera, fetcher, config));

    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
