//! HTTP surface: health check and the GitHub push webhook

pub mod handlers;
pub mod webhook;

use axum::{Router, routing};

use crate::SharedState;

pub use handlers::root;
pub use webhook::handle_webhook;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(root))
        .route("/webhook", routing::post(handle_webhook))
        .with_state(state)
}
