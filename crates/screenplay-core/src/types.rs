use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Block type tags recognized by the screenplay block model (spec §9).
/// Unknown tags round-trip through `Block::metadata` but are never
/// interpreted — the block model is deliberately not exhaustive.
///
/// Serialized as its bare string tag (`"scene_heading"`, `"camera_note"`,
/// ...). `#[serde(untagged)]` can't express "closed set of unit variants
/// plus one catch-all carrying the raw string" on its own, so this type
/// implements `Serialize`/`Deserialize` by hand instead, round-tripping
/// through `Display`/`From<String>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockType {
    SceneHeading,
    Action,
    Character,
    Dialogue,
    Parenthetical,
    Transition,
    Shot,
    General,
    CastList,
    NewAct,
    EndOfAct,
    Summary,
    /// Any tag not in the closed set above. Preserved verbatim on round-trip.
    Other(String),
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockType::SceneHeading => write!(f, "scene_heading"),
            BlockType::Action => write!(f, "action"),
            BlockType::Character => write!(f, "character"),
            BlockType::Dialogue => write!(f, "dialogue"),
            BlockType::Parenthetical => write!(f, "parenthetical"),
            BlockType::Transition => write!(f, "transition"),
            BlockType::Shot => write!(f, "shot"),
            BlockType::General => write!(f, "general"),
            BlockType::CastList => write!(f, "cast_list"),
            BlockType::NewAct => write!(f, "new_act"),
            BlockType::EndOfAct => write!(f, "end_of_act"),
            BlockType::Summary => write!(f, "summary"),
            BlockType::Other(s) => write!(f, "{s}"),
        }
    }
}

impl From<String> for BlockType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "scene_heading" => Self::SceneHeading,
            "action" => Self::Action,
            "character" => Self::Character,
            "dialogue" => Self::Dialogue,
            "parenthetical" => Self::Parenthetical,
            "transition" => Self::Transition,
            "shot" => Self::Shot,
            "general" => Self::General,
            "cast_list" => Self::CastList,
            "new_act" => Self::NewAct,
            "end_of_act" => Self::EndOfAct,
            "summary" => Self::Summary,
            _ => Self::Other(s),
        }
    }
}

impl Serialize for BlockType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BlockType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer).map_err(de::Error::custom)?;
        Ok(BlockType::from(s))
    }
}

/// A single heterogeneous block in a scene or script's content sequence.
///
/// Mirrors the Slate-shaped block the original editor stores: a `type`
/// tag, a `text` field, and an open metadata map for anything else
/// (alignment, character cues, act numbers, ...). Represented as a tagged
/// variant per spec §9 rather than a dynamic map, while still preserving
/// unknown keys for round-trip fidelity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub text: String,
    /// Child blocks — some editors nest dialogue under a character block.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
    /// Anything not covered by the fields above, preserved verbatim.
    #[serde(flatten)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Block {
    pub fn new(block_type: BlockType, text: impl Into<String>) -> Self {
        Self {
            block_type,
            text: text.into(),
            children: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Analysis lifecycle state for a Script (spec §3, §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisState {
    Empty,
    Partial,
    Analyzed,
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisState::Empty => write!(f, "empty"),
            AnalysisState::Partial => write!(f, "partial"),
            AnalysisState::Analyzed => write!(f, "analyzed"),
        }
    }
}

impl std::str::FromStr for AnalysisState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty" => Ok(Self::Empty),
            "partial" => Ok(Self::Partial),
            "analyzed" => Ok(Self::Analyzed),
            other => Err(format!("unknown analysis state: {other}")),
        }
    }
}

/// Thread kind for a PlotThread annotation (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotThreadKind {
    CharacterArc,
    Plot,
    Subplot,
    Theme,
}

impl fmt::Display for PlotThreadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CharacterArc => write!(f, "character_arc"),
            Self::Plot => write!(f, "plot"),
            Self::Subplot => write!(f, "subplot"),
            Self::Theme => write!(f, "theme"),
        }
    }
}

impl std::str::FromStr for PlotThreadKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "character_arc" => Ok(Self::CharacterArc),
            "plot" => Ok(Self::Plot),
            "subplot" => Ok(Self::Subplot),
            "theme" => Ok(Self::Theme),
            other => Err(format!("unknown plot thread kind: {other}")),
        }
    }
}

/// Relationship kind for a SceneRelationship annotation (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneRelationshipKind {
    SetupPayoff,
    Callback,
    Parallel,
    Echo,
}

impl fmt::Display for SceneRelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetupPayoff => write!(f, "setup_payoff"),
            Self::Callback => write!(f, "callback"),
            Self::Parallel => write!(f, "parallel"),
            Self::Echo => write!(f, "echo"),
        }
    }
}

impl std::str::FromStr for SceneRelationshipKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "setup_payoff" => Ok(Self::SetupPayoff),
            "callback" => Ok(Self::Callback),
            "parallel" => Ok(Self::Parallel),
            "echo" => Ok(Self::Echo),
            other => Err(format!("unknown relationship kind: {other}")),
        }
    }
}

/// Coarse chat intent classification (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    LocalEdit,
    SceneFeedback,
    GlobalQuestion,
    Brainstorm,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalEdit => write!(f, "local_edit"),
            Self::SceneFeedback => write!(f, "scene_feedback"),
            Self::GlobalQuestion => write!(f, "global_question"),
            Self::Brainstorm => write!(f, "brainstorm"),
        }
    }
}

/// Topic-continuity classification (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicMode {
    FollowUp,
    NewTopic,
}

/// Prompt token budget tier (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetTier {
    Quick,
    Standard,
    Deep,
}

/// Source of a CRDT snapshot derivation event (spec §3, C9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    Yjs,
    Manual,
    Import,
    Migrated,
    Compacted,
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yjs => write!(f, "yjs"),
            Self::Manual => write!(f, "manual"),
            Self::Import => write!(f, "import"),
            Self::Migrated => write!(f, "migrated"),
            Self::Compacted => write!(f, "compacted"),
        }
    }
}

impl std::str::FromStr for SnapshotSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yjs" => Ok(Self::Yjs),
            "manual" => Ok(Self::Manual),
            "import" => Ok(Self::Import),
            "migrated" => Ok(Self::Migrated),
            "compacted" => Ok(Self::Compacted),
            other => Err(format!("unknown snapshot source: {other}")),
        }
    }
}

/// Job queue priority band (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    /// Highest priority — drained first. Post-edit scene-summary refresh.
    Urgent,
    /// Character sheet refresh.
    Normal,
    /// Outline, embeddings, bulk ingestion.
    Low,
}

impl fmt::Display for JobPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Urgent => write!(f, "urgent"),
            Self::Normal => write!(f, "normal"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for JobPriority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "urgent" => Ok(Self::Urgent),
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown job priority: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_round_trips_unknown_tag_through_json() {
        let json = serde_json::json!({"type": "camera_note", "text": "wide shot"});
        let block: Block = serde_json::from_value(json).expect("parses");
        assert_eq!(block.block_type, BlockType::Other("camera_note".to_string()));
        assert_eq!(block.text, "wide shot");
    }

    #[test]
    fn known_block_type_round_trips() {
        let block = Block::new(BlockType::Dialogue, "Hello there.");
        let json = serde_json::to_value(&block).expect("serializes");
        let back: Block = serde_json::from_value(json).expect("parses");
        assert_eq!(back, block);
    }

    #[test]
    fn job_priority_orders_urgent_first() {
        let mut priorities = vec![JobPriority::Low, JobPriority::Urgent, JobPriority::Normal];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![JobPriority::Urgent, JobPriority::Normal, JobPriority::Low]
        );
    }
}
