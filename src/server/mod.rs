//! HTTP retrieval server
//!
//! Serves `POST /retrieve` for editor context providers and `GET /health`
//! for reachability checks.

#[cfg(test)]
mod tests;

pub mod retrieval;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::config::Config;
pub use retrieval::{ContextItem, RetrieveRequest, Retriever};

/// Build the router around a retriever
#[inline]
pub fn create_app(retriever: Retriever) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/retrieve", post(retrieve_context))
        .with_state(retriever)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind the configured address and serve until Ctrl+C or SIGTERM
#[inline]
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.server.bind_addr();
    let retriever = Retriever::new(config)?;
    let app = create_app(retriever);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Retrieval server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Retrieval server shutdown complete");
    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Internal failures never reach the client: they are logged and answered with `[]`
async fn retrieve_context(
    State(retriever): State<Retriever>,
    Json(request): Json<RetrieveRequest>,
) -> Json<Vec<ContextItem>> {
    match retriever.retrieve(&request).await {
        Ok(items) => Json(items),
        Err(e) => {
            error!("Error in retrieve_context: {}", e);
            Json(Vec::new())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, initiating shutdown"),
        () = terminate => info!("Received terminate signal, initiating shutdown"),
    }
}
