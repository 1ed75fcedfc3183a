//! HTTP surface: a single upload endpoint plus a health check.
//!
//! ```text
//! POST /        multipart upload (field `pdf` by default) → application/zip
//! GET  /health  {"status":"healthy","version":"…"}
//! ```

mod handlers;
mod response;

pub use response::ErrorResponse;

use crate::config::ServerConfig;
use crate::convert::Converter;
use crate::workspace::ScratchSpace;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared, cheaply clonable handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub(crate) converter: Arc<Converter>,
    pub(crate) scratch: ScratchSpace,
    pub(crate) upload_field: Arc<str>,
}

impl AppState {
    pub fn new(converter: Converter, config: &ServerConfig) -> Self {
        Self {
            converter: Arc::new(converter),
            scratch: ScratchSpace::from_config(config),
            upload_field: Arc::from(config.upload_field.as_str()),
        }
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }
}

/// Build the service router.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let app = Router::new()
        .route("/", post(handlers::convert_document))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Serve `app` until Ctrl+C or SIGTERM.
///
/// In-flight requests are allowed to finish, so their downloads still clean
/// up after themselves.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
