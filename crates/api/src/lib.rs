//! `api` crate: HTTP surface of the workflow editor.
//!
//! Routes (all under `/api/v1`):
//!   GET    /catalog
//!   GET    /workflows
//!   POST   /workflows
//!   GET    /workflows/{id}
//!   DELETE /workflows/{id}
//!   PUT    /workflows/{id}/definition
//!   POST   /workflows/{id}/commands
//!   GET    /workflows/{id}/export
//!   POST   /workflows/{id}/import?mode=replace|merge
//!   POST   /workflows/{id}/layout

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use engine::WorkflowStore;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn WorkflowStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/catalog", get(handlers::catalog::list))
        .route(
            "/workflows",
            get(handlers::workflows::list).post(handlers::workflows::create),
        )
        .route(
            "/workflows/:id",
            get(handlers::workflows::get).delete(handlers::workflows::delete),
        )
        .route(
            "/workflows/:id/definition",
            put(handlers::workflows::save_definition),
        )
        .route(
            "/workflows/:id/commands",
            post(handlers::workflows::apply_commands),
        )
        .route("/workflows/:id/export", get(handlers::transfer::export))
        .route("/workflows/:id/import", post(handlers::transfer::import))
        .route("/workflows/:id/layout", post(handlers::layout::auto_layout));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `bind` and serve until ctrl-c.
pub async fn serve(bind: &str, store: Arc<dyn WorkflowStore>) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "API server listening");

    axum::serve(listener, router(AppState::new(store)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
}

#[cfg(test)]
mod api_tests;
