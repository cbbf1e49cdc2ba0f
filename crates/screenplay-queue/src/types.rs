use serde::{Deserialize, Serialize};

pub use screenplay_core::types::JobPriority;

/// Sort rank for the dequeue query's `ORDER BY priority_rank` — lower
/// sorts first, matching `JobPriority`'s own `Urgent < Normal < Low`
/// ordering (spec §4.4, testable property 11).
pub fn priority_rank(priority: JobPriority) -> i64 {
    match priority {
        JobPriority::Urgent => 0,
        JobPriority::Normal => 1,
        JobPriority::Low => 2,
    }
}

/// The refresh/analysis work this queue dispatches (spec §4.4, §4.5).
/// Each variant names the artifact a worker regenerates; the payload is
/// just enough to look the source rows back up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    RefreshSceneSummary { scene_id: String },
    RefreshOutline { script_id: String },
    RefreshCharacterSheet { script_id: String, character_name: String },
    AnalyzeScriptPartial { script_id: String },
    AnalyzeScriptFull { script_id: String },
    ScriptStateAdvance { script_id: String },
}

impl JobKind {
    /// Dedup / primary key: enqueuing the same logical unit of work
    /// while one is already pending or running is a no-op (spec §4.4).
    pub fn dedup_key(&self) -> String {
        match self {
            JobKind::RefreshSceneSummary { scene_id } => format!("refresh_scene_summary:{scene_id}"),
            JobKind::RefreshOutline { script_id } => format!("refresh_outline:{script_id}"),
            JobKind::RefreshCharacterSheet { script_id, character_name } => {
                format!("refresh_character_sheet:{script_id}:{character_name}")
            }
            JobKind::AnalyzeScriptPartial { script_id } => format!("analyze_script_partial:{script_id}"),
            JobKind::AnalyzeScriptFull { script_id } => format!("analyze_script_full:{script_id}"),
            JobKind::ScriptStateAdvance { script_id } => format!("script_state_advance:{script_id}"),
        }
    }

    /// Per-kind deadline (spec §5): ingestion-class jobs get the longer
    /// 600s budget, refresh-class jobs the shorter 300s one.
    pub fn timeout_secs(&self, queue_config: &screenplay_core::config::QueueConfig) -> u64 {
        match self {
            JobKind::AnalyzeScriptPartial { .. } | JobKind::AnalyzeScriptFull { .. } => queue_config.ingestion_timeout_secs,
            _ => queue_config.refresh_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    DeadLetter,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::DeadLetter => "dead_letter",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "dead_letter" => Ok(JobStatus::DeadLetter),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A persisted queue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub priority: JobPriority,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub last_error: Option<String>,
    pub started_at: Option<String>,
    pub deadline_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
