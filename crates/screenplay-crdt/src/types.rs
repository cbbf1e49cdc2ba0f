use serde::{Deserialize, Serialize};
use std::fmt;

/// The two CRDT documents the spec names (§3: `ScriptCRDTUpdate` /
/// `SceneCRDTUpdate`) differ only in which row they're keyed against —
/// the update log and compaction logic are identical either way, so
/// they share one table distinguished by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    Script,
    Scene,
}

impl fmt::Display for ParentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentKind::Script => write!(f, "script"),
            ParentKind::Scene => write!(f, "scene"),
        }
    }
}

impl std::str::FromStr for ParentKind {
    type Err = crate::error::CrdtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "script" => Ok(ParentKind::Script),
            "scene" => Ok(ParentKind::Scene),
            other => Err(crate::error::CrdtError::MalformedUpdate(format!("unknown parent_kind: {other}"))),
        }
    }
}

/// One append-only row in the update log. `bytes` is opaque to this
/// crate — it's handed to whatever `CrdtDocument` implementation the
/// caller constructs, never parsed here.
#[derive(Debug, Clone)]
pub struct CrdtUpdateRow {
    pub id: String,
    pub parent_kind: ParentKind,
    pub parent_id: String,
    pub actor: Option<String>,
    pub bytes: Vec<u8>,
    pub created_at: String,
}

/// Derived-snapshot provenance (spec §3: `SceneSnapshotMetadata`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub parent_kind: ParentKind,
    pub parent_id: String,
    pub source: screenplay_core::types::SnapshotSource,
    pub update_count: i64,
    pub content_sha256: String,
    pub generated_at: String,
    pub byte_size: i64,
}
