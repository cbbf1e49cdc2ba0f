use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level config (screenplay.toml + SCREENPLAY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenplayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub budgets: BudgetsConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

impl Default for ScreenplayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            thresholds: ThresholdsConfig::default(),
            budgets: BudgetsConfig::default(),
            providers: ProvidersConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

/// HTTP bind address for `screenplay-engine` (spec §6 entrypoints are
/// exposed over HTTP by the engine binary; the orchestration core itself
/// stays transport-agnostic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind(), port: default_port() }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    4477
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Staleness and state-machine thresholds (spec §4.3, §4.11, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default = "default_outline_stale_threshold")]
    pub outline_stale_threshold: u32,
    #[serde(default = "default_character_stale_threshold")]
    pub character_stale_threshold: u32,
    #[serde(default = "default_empty_to_partial_min_scenes")]
    pub empty_to_partial_min_scenes: u32,
    #[serde(default = "default_empty_to_partial_min_pages")]
    pub empty_to_partial_min_pages: u32,
    #[serde(default = "default_partial_to_analyzed_min_scenes")]
    pub partial_to_analyzed_min_scenes: u32,
    #[serde(default = "default_partial_to_analyzed_min_pages")]
    pub partial_to_analyzed_min_pages: u32,
    #[serde(default = "default_conversation_summary_message_threshold")]
    pub conversation_summary_message_threshold: u32,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            outline_stale_threshold: default_outline_stale_threshold(),
            character_stale_threshold: default_character_stale_threshold(),
            empty_to_partial_min_scenes: default_empty_to_partial_min_scenes(),
            empty_to_partial_min_pages: default_empty_to_partial_min_pages(),
            partial_to_analyzed_min_scenes: default_partial_to_analyzed_min_scenes(),
            partial_to_analyzed_min_pages: default_partial_to_analyzed_min_pages(),
            conversation_summary_message_threshold:
                default_conversation_summary_message_threshold(),
        }
    }
}

/// Prompt token budget tiers (spec §4.8, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetsConfig {
    #[serde(default = "default_budget_quick")]
    pub quick_tokens: u32,
    #[serde(default = "default_budget_standard")]
    pub standard_tokens: u32,
    #[serde(default = "default_budget_deep")]
    pub deep_tokens: u32,
}

impl Default for BudgetsConfig {
    fn default() -> Self {
        Self {
            quick_tokens: default_budget_quick(),
            standard_tokens: default_budget_standard(),
            deep_tokens: default_budget_deep(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub anthropic: Option<AnthropicConfig>,
    pub embedding: Option<EmbeddingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
    #[serde(default = "default_haiku_model")]
    pub haiku_model: String,
    #[serde(default = "default_sonnet_model")]
    pub sonnet_model: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_anthropic_base_url(),
            haiku_model: default_haiku_model(),
            sonnet_model: default_sonnet_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub api_key: String,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dim")]
    pub dimension: usize,
}

/// Job queue / worker pool sizing (spec §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_summary_concurrency")]
    pub max_concurrent_summaries: usize,
    #[serde(default = "default_sheet_concurrency")]
    pub max_concurrent_sheets: usize,
    #[serde(default = "default_embedding_batch")]
    pub embedding_batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_ingestion_timeout_secs")]
    pub ingestion_timeout_secs: u64,
    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_summaries: default_summary_concurrency(),
            max_concurrent_sheets: default_sheet_concurrency(),
            embedding_batch_size: default_embedding_batch(),
            max_retries: default_max_retries(),
            ingestion_timeout_secs: default_ingestion_timeout_secs(),
            refresh_timeout_secs: default_refresh_timeout_secs(),
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.screenplay/screenplay.db", home)
}
fn default_outline_stale_threshold() -> u32 {
    5
}
fn default_character_stale_threshold() -> u32 {
    3
}
fn default_empty_to_partial_min_scenes() -> u32 {
    3
}
fn default_empty_to_partial_min_pages() -> u32 {
    10
}
fn default_partial_to_analyzed_min_scenes() -> u32 {
    30
}
fn default_partial_to_analyzed_min_pages() -> u32 {
    60
}
fn default_conversation_summary_message_threshold() -> u32 {
    15
}
fn default_budget_quick() -> u32 {
    1_200
}
fn default_budget_standard() -> u32 {
    5_000
}
fn default_budget_deep() -> u32 {
    20_000
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_haiku_model() -> String {
    "claude-haiku-4-5".to_string()
}
fn default_sonnet_model() -> String {
    "claude-sonnet-4-5".to_string()
}
fn default_embedding_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_embedding_model() -> String {
    "screenplay-embed-1".to_string()
}
fn default_embedding_dim() -> usize {
    1536
}
fn default_summary_concurrency() -> usize {
    8
}
fn default_sheet_concurrency() -> usize {
    4
}
fn default_embedding_batch() -> usize {
    96
}
fn default_max_retries() -> u32 {
    3
}
fn default_ingestion_timeout_secs() -> u64 {
    600
}
fn default_refresh_timeout_secs() -> u64 {
    300
}

impl ScreenplayConfig {
    /// Load config from a TOML file with SCREENPLAY_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. SCREENPLAY_CONFIG env var
    ///   3. ~/.screenplay/screenplay.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("SCREENPLAY_CONFIG").ok())
            .unwrap_or_else(default_config_path);

        let config: ScreenplayConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SCREENPLAY_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.screenplay/screenplay.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_thresholds() {
        let t = ThresholdsConfig::default();
        assert_eq!(t.outline_stale_threshold, 5);
        assert_eq!(t.character_stale_threshold, 3);
        assert_eq!(t.empty_to_partial_min_scenes, 3);
        assert_eq!(t.empty_to_partial_min_pages, 10);
        assert_eq!(t.partial_to_analyzed_min_scenes, 30);
        assert_eq!(t.partial_to_analyzed_min_pages, 60);
    }

    #[test]
    fn defaults_match_spec_budgets() {
        let b = BudgetsConfig::default();
        assert_eq!(b.quick_tokens, 1_200);
        assert_eq!(b.standard_tokens, 5_000);
        assert_eq!(b.deep_tokens, 20_000);
    }

    #[test]
    fn load_falls_back_to_defaults_when_file_missing() {
        let config = ScreenplayConfig::load(Some("/nonexistent/path/screenplay.toml"))
            .expect("figment tolerates a missing file and uses defaults");
        assert_eq!(config.thresholds.outline_stale_threshold, 5);
    }
}
