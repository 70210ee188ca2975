use crate::state;

use axum::Router;
use axum::routing::{get, patch, post};

mod registrations;
mod summaries;

pub fn app(state: state::AppState) -> Router {
    Router::new()
        .route("/", get(summaries::index))
        .route("/health", get(health))
        .route("/vapid", get(summaries::vapid_public_key))
        .route("/registrations", post(registrations::create_registration))
        .route(
            "/registrations/{id}",
            patch(registrations::update_registration).delete(registrations::delete_registration),
        )
        .route("/{location}", get(summaries::summary_page))
        .with_state(state)
}

pub(crate) async fn health() -> &'static str {
    "ok"
}
