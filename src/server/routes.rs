//! API route configuration.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    // The dashboard may be served from another origin than the API.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/", get(handlers::index))
        .route("/api/health", get(handlers::health))
        .route("/api/status", get(handlers::status))
        .route("/api/generate", post(handlers::generate))
        .route("/api/audio/{user_id}/{filename}", get(handlers::get_audio))
        .route("/api/list-audio", get(handlers::list_audio))
        .route("/api/cleanup", post(handlers::cleanup))
        .route("/api/reload", post(handlers::reload));

    // Deprecated unpartitioned fetch, mounted only on explicit opt-in.
    if state.legacy_audio_route {
        router = router.route("/api/audio/{filename}", get(handlers::get_audio_legacy));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
