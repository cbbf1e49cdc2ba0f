//! `StoreCRDTUpdate` / `LoadCRDT` entrypoints (spec §6, §4.9).
//!
//! Updates are opaque bytes; wire-encoded as hex here since this is the
//! illustrative HTTP surface, not the collaboration transport itself
//! (spec §1 Non-goals: "real-time collaboration transport implementation").

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use screenplay_agent::pubsub::scene_updates_topic;
use screenplay_core::types::{Block, SnapshotSource};
use screenplay_crdt::{JsonSnapshotDocument, ParentKind, DEFAULT_COMPACTION_THRESHOLD};

use crate::app::AppState;
use crate::error::EngineError;

#[derive(Deserialize)]
pub struct StoreUpdateRequest {
    #[serde(default = "default_parent_kind")]
    pub parent_kind: String,
    pub bytes_hex: String,
    #[serde(default)]
    pub actor: Option<String>,
}

fn default_parent_kind() -> String {
    "script".to_string()
}

#[derive(Serialize)]
pub struct StoreUpdateResponse {
    pub update_id: String,
}

/// POST /scripts/{script_id}/crdt — `StoreCRDTUpdate`.
pub async fn store_update_handler(
    State(state): State<Arc<AppState>>,
    Path(script_id): Path<String>,
    Json(req): Json<StoreUpdateRequest>,
) -> Result<Json<StoreUpdateResponse>, EngineError> {
    let parent_kind: ParentKind = req.parent_kind.parse().map_err(|_| EngineError::Validation(format!("unknown parent_kind: {}", req.parent_kind)))?;
    let bytes = hex::decode(&req.bytes_hex).map_err(|e| EngineError::Validation(format!("invalid bytes_hex: {e}")))?;
    let update_id = state.crdt.store_update(parent_kind, &script_id, &bytes, req.actor.as_deref())?;

    // Broadcast the raw update to live subscribers (spec §9: "Redis-like
    // pub/sub channels per (script, scene) broadcast CRDT updates").
    // Topics are keyed per-scene; script-level updates have no topic.
    if matches!(parent_kind, ParentKind::Scene) {
        state.pubsub.publish(&scene_updates_topic(&script_id), bytes);
    }

    Ok(Json(StoreUpdateResponse { update_id }))
}

#[derive(Deserialize)]
pub struct LoadQuery {
    #[serde(default = "default_parent_kind")]
    pub parent_kind: String,
}

#[derive(Serialize)]
pub struct LoadResponse {
    pub blocks: Vec<Block>,
    pub compacted: bool,
    pub update_count: i64,
}

/// GET /scripts/{script_id}/crdt — `LoadCRDT`: applies the update log to
/// a fresh `JsonSnapshotDocument`, compacting it in place when the log
/// exceeds the default threshold (spec §4.9 `LoadAndCompactIfNeeded`).
pub async fn load_handler(
    State(state): State<Arc<AppState>>,
    Path(script_id): Path<String>,
    axum::extract::Query(query): axum::extract::Query<LoadQuery>,
) -> Result<Json<LoadResponse>, EngineError> {
    let parent_kind: ParentKind = query.parent_kind.parse().map_err(|_| EngineError::Validation(format!("unknown parent_kind: {}", query.parent_kind)))?;

    let mut doc = JsonSnapshotDocument::default();
    let compacted = state.crdt.load_and_compact_if_needed(parent_kind, &script_id, &mut doc, DEFAULT_COMPACTION_THRESHOLD)?;
    let source = if compacted { SnapshotSource::Compacted } else { SnapshotSource::Manual };
    let (blocks, _metadata) = state.crdt.derive_snapshot::<JsonSnapshotDocument>(parent_kind, &script_id, source)?;
    let update_count = state.crdt.update_count(parent_kind, &script_id)?;

    Ok(Json(LoadResponse { blocks, compacted, update_count }))
}
