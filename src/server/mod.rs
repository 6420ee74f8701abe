//! The HTTPS listener and request handler (§4.4, §4.5).

pub mod handler;
pub mod state;

pub use state::{AppState, SharedState};

use axum::routing::get;
use axum::Router;

/// Build the agent's `axum::Router`, wiring the two recognized URI
/// patterns (§4.5); every other URI falls through to axum's built-in 404.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route(
            "/v1/check/{cmd}",
            get(handler::check_handler)
                .head(handler::check_head_handler)
                .post(handler::check_post_handler),
        )
        .route("/v1/version", get(handler::version_handler))
        .with_state(state)
}
