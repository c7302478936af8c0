use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Create file server routes
pub fn file_routes() -> Router<AppState> {
    Router::new()
        // Listing page
        .route("/", get(handlers::index))
        // Single file download
        .route("/download", get(handlers::download))
        // Remote stop
        .route("/shutdown", get(handlers::shutdown))
}

/// Full application router with tracing, ready to serve.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(file_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
