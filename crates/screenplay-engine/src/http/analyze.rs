//! `AnalyzeScript` entrypoint (spec §6): enqueues the ingestion job and
//! returns its id; the background worker pool performs the actual work.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use screenplay_core::types::JobPriority;
use screenplay_queue::JobKind;

use crate::app::AppState;
use crate::error::EngineError;

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    /// `partial` or `full` (spec §6: `depth ∈ {partial, full}`).
    #[serde(default = "default_depth")]
    pub depth: String,
}

fn default_depth() -> String {
    "partial".to_string()
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub job_id: String,
}

pub async fn analyze_script_handler(
    State(state): State<Arc<AppState>>,
    Path(script_id): Path<String>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, EngineError> {
    let kind = match req.depth.as_str() {
        "full" => JobKind::AnalyzeScriptFull { script_id },
        "partial" => JobKind::AnalyzeScriptPartial { script_id },
        other => return Err(EngineError::Validation(format!("unknown analysis depth: {other}"))),
    };
    let job = state.queue.enqueue(kind, JobPriority::Low, state.config.queue.max_retries, state.config.queue.ingestion_timeout_secs)?;
    Ok(Json(AnalyzeResponse { job_id: job.id }))
}
