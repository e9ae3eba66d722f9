pub mod agents;
pub mod runs;

use crate::state::AppState;
use axum::{routing::get, Router};

async fn health() -> &'static str {
    "ok"
}

pub fn configure(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(agents::routes(state.clone()))
        .merge(runs::routes(state))
}
