//! API Routes
//!
//! Configures the Axum router with all sidecar endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_response_handler, dm_limits_handler, dm_send_handler, get_profile_handler,
    get_response_handler, health_handler, invalidate_profile_handler, set_response_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/responses", put(set_response_handler))
        .route(
            "/responses/:key",
            get(get_response_handler).delete(delete_response_handler),
        )
        .route("/dm/send", post(dm_send_handler))
        .route("/dm/limits/:user_id/:channel_id", get(dm_limits_handler))
        .route(
            "/users/:id",
            get(get_profile_handler).delete(invalidate_profile_handler),
        )
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
