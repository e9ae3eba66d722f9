use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use herald::units::AgentManifest;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
struct AgentList {
    agents: Vec<AgentManifest>,
}

async fn list_agents(State(state): State<AppState>) -> Json<AgentList> {
    Json(AgentList {
        agents: state.registry.manifests(),
    })
}

async fn get_agent(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.registry.get(&name) {
        Some(unit) => Json(unit.manifest().clone()).into_response(),
        None => not_found(&name),
    }
}

pub fn not_found(name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("Agent {} not found", name) })),
    )
        .into_response()
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/agents", get(list_agents))
        .route("/agents/:name", get(get_agent))
        .with_state(state)
}
