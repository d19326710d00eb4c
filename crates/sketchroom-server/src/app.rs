use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::AppState;
use crate::ws::ws_handler;

/// Build the full application router.
pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.frontend_url);

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .merge(api::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Restrict CORS to the frontend origin; fall back to permissive when it
/// is not a valid header value.
fn cors_layer(frontend_url: &str) -> CorsLayer {
    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            tracing::warn!(frontend_url, "Invalid FRONTEND_URL; allowing any origin");
            CorsLayer::permissive()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}
