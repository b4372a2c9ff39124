mod config;
mod error;
mod extractor;
mod fetch;
mod sanitize;
mod web;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    error::ApiError,
    extractor::YtDlp,
    web::{AppState, router},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "clipgrab=info,tower_http=info".to_string()),
        )
        .init();

    if let Err(error) = run().await {
        eprintln!("Server error: {}", error.message);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ApiError> {
    let config = AppConfig::from_env()?;

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .map_err(|error| {
            ApiError::internal(format!(
                "Could not create work directory {:?}: {error}",
                config.work_dir
            ))
        })?;

    if config.allowed_origins.is_empty() {
        warn!("ALLOWED_ORIGINS is not set. Only same-origin requests from the built-in form will work.");
    }
    info!(
        "Using {:?} with a {}s timeout, scratch files in {:?}",
        config.yt_dlp_bin,
        config.yt_dlp_timeout.as_secs(),
        config.work_dir
    );

    let state = AppState {
        extractor: Arc::new(YtDlp::new(config.yt_dlp_bin.clone(), config.yt_dlp_timeout)),
        work_dir: config.work_dir.clone(),
    };
    let app = router(state, &config.allowed_origins);

    let listener = TcpListener::bind(&config.bind_addr).await.map_err(|error| {
        ApiError::internal(format!(
            "Could not bind {}: {error}",
            config.bind_addr
        ))
    })?;

    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .map_err(|error| ApiError::internal(format!("HTTP server error: {error}")))
}
