//! `OnSceneChanged` and `UpdateScriptWithCAS` entrypoints (spec §6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use screenplay_agent::pubsub::scene_awareness_topic;
use screenplay_core::types::{Block, JobPriority};
use screenplay_queue::JobKind;
use screenplay_store::cas::CasOutcome;
use screenplay_store::types::SceneDelta;

use crate::app::AppState;
use crate::error::EngineError;

#[derive(Serialize)]
pub struct SceneChangedResponse {
    pub outline_became_stale: bool,
    pub characters_became_stale: Vec<String>,
    pub enqueued_jobs: Vec<String>,
}

/// POST /scenes/{scene_id}/changed — synchronous staleness update
/// (C3.OnSceneChanged), then asynchronous job enqueue per spec §2's flow
/// ("both emit 'scene-changed' signals to C3 ... enqueues jobs via C4").
pub async fn on_scene_changed_handler(
    State(state): State<Arc<AppState>>,
    Path(scene_id): Path<String>,
) -> Result<Json<SceneChangedResponse>, EngineError> {
    let scene = state.repo.get_scene(&scene_id)?;
    let report = state.repo.on_scene_changed(&scene_id, &state.config.thresholds)?;

    let awareness = serde_json::json!({
        "outline_became_stale": report.outline_became_stale,
        "characters_became_stale": report.characters_became_stale,
    });
    state.pubsub.publish(&scene_awareness_topic(&scene_id), awareness.to_string().into_bytes());

    let mut enqueued = Vec::new();

    let summary_job = state.queue.enqueue(
        JobKind::RefreshSceneSummary { scene_id: scene_id.clone() },
        JobPriority::Urgent,
        state.config.queue.max_retries,
        state.config.queue.refresh_timeout_secs,
    )?;
    enqueued.push(summary_job.id);

    if report.outline_became_stale {
        let job = state.queue.enqueue(
            JobKind::RefreshOutline { script_id: scene.script_id.clone() },
            JobPriority::Low,
            state.config.queue.max_retries,
            state.config.queue.refresh_timeout_secs,
        )?;
        enqueued.push(job.id);
    }
    for character_name in &report.characters_became_stale {
        let job = state.queue.enqueue(
            JobKind::RefreshCharacterSheet { script_id: scene.script_id.clone(), character_name: character_name.clone() },
            JobPriority::Normal,
            state.config.queue.max_retries,
            state.config.queue.refresh_timeout_secs,
        )?;
        enqueued.push(job.id);
    }

    Ok(Json(SceneChangedResponse {
        outline_became_stale: report.outline_became_stale,
        characters_became_stale: report.characters_became_stale,
        enqueued_jobs: enqueued,
    }))
}

#[derive(Deserialize)]
pub struct CasRequest {
    pub user: String,
    pub base_version: i64,
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub scene_deltas: Vec<SceneDelta>,
    pub op_id: String,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CasResponse {
    Success { version: i64, updated_at: String },
    Conflict { latest_version: i64, latest_blocks: Option<Vec<Block>>, latest_updated_at: String },
}

/// POST /scripts/{script_id}/cas — `UpdateWithCAS` (spec §6, §4.10).
pub async fn update_with_cas_handler(
    State(state): State<Arc<AppState>>,
    Path(script_id): Path<String>,
    Json(req): Json<CasRequest>,
) -> Result<Json<CasResponse>, EngineError> {
    let outcome = state.repo.update_with_cas(&script_id, &req.user, req.base_version, &req.blocks, &req.scene_deltas, &req.op_id)?;
    Ok(Json(match outcome {
        CasOutcome::Success(s) => CasResponse::Success { version: s.version, updated_at: s.updated_at },
        CasOutcome::Conflict(c) => CasResponse::Conflict {
            latest_version: c.latest_version,
            latest_blocks: c.latest_blocks,
            latest_updated_at: c.latest_updated_at,
        },
    }))
}
