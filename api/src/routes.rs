use axum::{routing::post, Router};

use crate::{handlers, state::AppState};

pub fn contact_routes() -> Router<AppState> {
    Router::new().route("/", post(handlers::submit_contact_request))
}
