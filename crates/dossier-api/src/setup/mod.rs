//! Application setup and initialization

pub mod routes;
pub mod server;

use anyhow::{Context, Result};
use dossier_core::ServerConfig;

use crate::state::AppState;

/// Build state and router from a validated configuration.
pub async fn initialize_app(config: ServerConfig) -> Result<(AppState, axum::Router)> {
    config.validate().context("Configuration validation failed")?;
    tracing::info!("Configuration loaded and validated successfully");

    let state = AppState::new(config)
        .await
        .context("Failed to initialize upload storage")?;
    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
