use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;

/// Build and configure the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Record routes
        .route(
            "/collections/{collection}/records",
            post(handlers::insert_record),
        )
        .route(
            "/collections/{collection}/records/{key}",
            get(handlers::get_record)
                .patch(handlers::patch_record)
                .delete(handlers::delete_record),
        )
        .route(
            "/collections/{collection}/query",
            post(handlers::query_records),
        )
        // Middleware
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
