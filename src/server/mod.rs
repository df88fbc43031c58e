//! HTTP control surface.
//!
//! - `GET /api/og` generates or fetches a preview.
//! - `GET|DELETE /api/og-cache` inspects and invalidates the cache.
//! - `GET {url_prefix}/{id}.png` serves stored previews.
//!
//! None of the endpoints are authenticated.

mod error;
mod handlers;
pub mod models;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::generator::PreviewGenerator;

pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub generator: Arc<PreviewGenerator>,
}

impl AppState {
    pub fn new(generator: PreviewGenerator) -> Self {
        Self {
            generator: Arc::new(generator),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the router. Stored previews are served under the store's URL prefix.
pub fn build_router(state: AppState) -> Router {
    let preview_route = format!("{}/{{file}}", state.generator.store().url_prefix());

    Router::new()
        .route("/api/og", get(handlers::generate))
        .route(
            "/api/og-cache",
            get(handlers::cache_get)
                .delete(handlers::cache_delete)
                .fallback(handlers::method_not_allowed),
        )
        .route(&preview_route, get(handlers::preview))
        .with_state(state)
}

/// Serves `router` on `addr` until Ctrl-C or SIGTERM.
///
/// In-flight requests get `grace` to finish once a signal arrives.
pub async fn serve(addr: SocketAddr, router: Router, grace: Duration) -> Result<(), ServeError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    info!(addr = %addr, "listening");

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    let mut graceful_rx = stop_rx.clone();
    let server = async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = graceful_rx.wait_for(|stop| *stop).await;
                info!("shutdown signal received; draining connections");
            })
            .await
    };

    let mut deadline_rx = stop_rx;
    let deadline = async move {
        if deadline_rx.wait_for(|stop| *stop).await.is_ok() {
            tokio::time::sleep(grace).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => result?,
        _ = deadline => warn!(grace_secs = grace.as_secs(), "graceful shutdown timed out"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
