use screenplay_core::types::{AnalysisState, Block, PlotThreadKind, SceneRelationshipKind};
use serde::{Deserialize, Serialize};

/// Root of ownership (spec §3). Owns its Scenes, CRDT updates, Outline,
/// CharacterSheets, PlotThreads, SceneRelationships, and TokenUsage rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub analysis_state: AnalysisState,
    /// CAS version for the script-level block content.
    pub version: i64,
    pub blocks: Option<Vec<Block>>,
    /// Opaque CRDT state, only meaningful to screenplay-crdt.
    pub crdt_state: Option<Vec<u8>>,
    pub content_fingerprint: Option<String>,
    pub last_state_transition: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub updated_by: Option<String>,
}

/// Ordered child of a Script (spec §3). Positions are dense and unique
/// per script; a null `content_hash` means "never analyzed".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub script_id: String,
    pub position: i64,
    pub heading: String,
    pub blocks: Vec<Block>,
    /// Unstructured source text, used by `hash::scene_text`'s fallback
    /// chain when `blocks` carries no text of its own (spec §4.1).
    pub raw_text: Option<String>,
    pub version: i64,
    pub content_hash: Option<String>,
    pub is_key_scene: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// 1:1 with Scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSummary {
    pub scene_id: String,
    /// Structured text: Action / Conflict / Character Changes / Plot
    /// Progression / Tone.
    pub summary_text: String,
    pub token_estimate: i64,
    pub version: i64,
    pub generated_at: String,
}

/// 1:1 with Script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptOutline {
    pub script_id: String,
    pub summary_text: String,
    pub token_estimate: i64,
    pub is_stale: bool,
    pub dirty_scene_count: i64,
    pub version: i64,
    pub generated_at: Option<String>,
}

/// (Script, character-name) unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterSheet {
    pub script_id: String,
    pub character_name: String,
    pub summary_text: String,
    pub token_estimate: i64,
    pub is_stale: bool,
    pub dirty_scene_count: i64,
    pub version: i64,
    pub generated_at: Option<String>,
}

/// Many-to-many link (Scene, character-name); primary key is the pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneCharacter {
    pub scene_id: String,
    pub script_id: String,
    pub character_name: String,
}

/// 1:1 with Scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneEmbedding {
    pub scene_id: String,
    pub vector: Vec<f32>,
    pub generated_at: String,
}

/// Optional cross-scene annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotThread {
    pub id: String,
    pub script_id: String,
    pub kind: PlotThreadKind,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

/// Optional cross-scene annotation linking two scenes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRelationship {
    pub id: String,
    pub script_id: String,
    pub from_scene_id: String,
    pub to_scene_id: String,
    pub kind: SceneRelationshipKind,
    pub note: Option<String>,
    pub created_at: String,
}

/// Idempotency ledger row for CAS writes (C10). Stores the cached result
/// so a replayed op-id returns the original response (spec §4.10, S4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteOp {
    pub op_id: String,
    pub script_id: String,
    /// JSON-encoded `CasResult` as it was originally returned.
    pub result: String,
    pub created_at: String,
}

/// Per-call LLM accounting (spec §3, C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub id: i64,
    pub script_id: Option<String>,
    pub model: String,
    pub input_tokens: i64,
    pub cache_creation_tokens: i64,
    pub cache_read_tokens: i64,
    pub output_tokens: i64,
    pub cost_usd: f64,
    pub latency_ms: i64,
    pub iteration: Option<i64>,
    pub tool_name: Option<String>,
    pub created_at: String,
}

/// A single observability data point for a named operation (ambient
/// stack — spec §9 carries no metrics export, so these rows are the
/// only durable record of operation latency/outcome; surfaced for
/// inspection, never aggregated in-process).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetric {
    pub id: i64,
    pub operation: String,
    pub script_id: Option<String>,
    pub success: bool,
    pub latency_ms: i64,
    pub error_kind: Option<String>,
    pub created_at: String,
}

/// Report returned by `StalenessTracker::on_scene_changed` describing
/// what crossed its threshold (spec §4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StalenessReport {
    pub outline_became_stale: bool,
    pub characters_became_stale: Vec<String>,
}

/// Result of a CAS write (spec §4.10, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasSuccess {
    pub version: i64,
    pub updated_at: String,
}

/// The conflicting row snapshot returned on a CAS mismatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasConflict {
    pub latest_version: i64,
    pub latest_blocks: Option<Vec<Block>>,
    pub latest_updated_at: String,
}

/// A single scene-level change bundled into a CAS write (spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDelta {
    pub scene_id: String,
    pub heading: Option<String>,
    pub position: Option<i64>,
    pub blocks: Option<Vec<Block>>,
}

/// One row of the non-CRDT writer's version trail (spec §4.10 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionHistoryEntry {
    pub script_id: String,
    pub version: i64,
    pub updated_by: String,
    pub blocks: Vec<Block>,
    pub created_at: String,
}
