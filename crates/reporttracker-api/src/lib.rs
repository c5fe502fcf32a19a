pub mod auth;
pub mod error;
pub mod evidence;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use axum::Router;

pub use state::AppState;

use reporttracker_core::evidence::MAX_SLIP_BYTES;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/flags", post(routes::create_flag).get(routes::list_flags))
        .route(
            "/flags/{id}",
            get(routes::get_flag).patch(routes::edit_flag),
        )
        .route("/flags/{id}/accept", patch(routes::accept_flag))
        .route("/flags/{id}/discard", patch(routes::discard_flag))
        .route("/flags/{id}/revive", patch(routes::revive_flag))
        // Slips go up to 10MB; leave headroom for the other form fields.
        .layer(DefaultBodyLimit::max(MAX_SLIP_BYTES + 64 * 1024))
        .with_state(state)
}
