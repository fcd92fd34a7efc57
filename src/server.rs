//! HTTP front of the detection service.

mod error;
mod routes;
mod state;

pub use error::ServiceError;
pub use state::AppState;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::annotate::Annotator;
use crate::config::ServerConfig;
use crate::registry::ModelRegistry;

/// Upload size cap. Large enough for camera stills, small enough to keep a
/// misbehaving client from buffering gigabytes.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/set_model/", post(routes::set_model))
        .route("/upload/", post(routes::upload))
        .route("/health", get(routes::health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Loads the default model, binds, and serves until ctrl-c.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let registry = Arc::new(ModelRegistry::new(config.clone()));
    let annotator = Arc::new(Annotator::new(config.font_path.as_deref()));

    registry
        .activate(config.default_variant)
        .await
        .with_context(|| format!("loading default model {}", config.default_variant))?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    log::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(AppState::new(registry, annotator)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("could not listen for shutdown signal: {err}");
    }
}
