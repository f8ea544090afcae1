//! # HTTP Server
//!
//! JSON endpoints over the store. Store calls are synchronous, so handlers
//! hand them to the blocking pool.
use crate::config::Config;
use crate::database::Store;
use crate::error::TrackerError;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod error;
mod routes;

pub use error::{ApiError, ErrorCode};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<Store>, config: Arc<Config>) -> Self {
        Self { store, config }
    }
}

/// Builds the router with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/sheets", get(routes::list_sheets))
        .route("/filters/:sheet", get(routes::column_filters))
        .route("/data/:sheet", get(routes::sheet_data))
        .route("/update-blank-column", post(routes::edit_placeholder))
        .route(
            "/project/:project_id",
            get(routes::get_project).post(routes::upsert_project),
        )
        .route("/update_checker/:project_id", post(routes::update_checker))
        .route("/checker_list", get(routes::list_checkers))
        .route(
            "/statistics",
            get(routes::list_statistics).post(routes::recompute_statistics),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `router` on the configured address until `shutdown` resolves.
pub async fn serve<F>(state: AppState, shutdown: F) -> Result<(), TrackerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config.server.bind;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
