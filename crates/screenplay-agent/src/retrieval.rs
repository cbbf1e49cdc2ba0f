//! Retrieval (C7, spec §4.7).
//!
//! Vector + structured lookup across summaries, outline, and sheets,
//! shaped by the classified intent. Cosine similarity is computed
//! in-process over `Vec<f32>` embeddings loaded from SQLite BLOBs — no
//! external vector DB dependency.

use std::sync::Arc;

use screenplay_core::types::Intent;
use screenplay_store::types::{CharacterSheet, Scene, SceneSummary, ScriptOutline};
use screenplay_store::ScriptRepository;

use crate::client::LlmClient;
use crate::error::Result;

/// Vector-search threshold tiers (spec §4.7 `VectorSearch`).
pub const PROBE_THRESHOLD: f32 = 0.5;
pub const GENERAL_THRESHOLD: f32 = 0.3;

#[derive(Debug, Clone)]
pub struct ScoredScene {
    pub scene: Scene,
    pub summary: Option<SceneSummary>,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalHints {
    pub scene_position: Option<i64>,
    pub character_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub scenes: Vec<ScoredScene>,
    pub outline: Option<ScriptOutline>,
    pub outline_is_stale: bool,
    pub character_sheets: Vec<CharacterSheet>,
}

pub struct Retriever {
    repo: Arc<ScriptRepository>,
    llm: Arc<LlmClient>,
    embedding_model: String,
}

impl Retriever {
    pub fn new(repo: Arc<ScriptRepository>, llm: Arc<LlmClient>, embedding_model: String) -> Self {
        Self { repo, llm, embedding_model }
    }

    /// `VectorSearch(script_id, query, k)` — embeds the query, returns the
    /// top-k scenes scoring at or above `threshold`.
    pub async fn vector_search(&self, script_id: &str, query: &str, k: usize, threshold: f32) -> Result<Vec<ScoredScene>> {
        let query_vec = self
            .llm
            .embed(&self.embedding_model, &[query.to_string()], Some(script_id))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let embeddings = self.repo.list_scene_embeddings(script_id)?;
        let mut scored: Vec<ScoredScene> = Vec::new();
        for emb in embeddings {
            let score = cosine_similarity(&query_vec, &emb.vector);
            if score < threshold {
                continue;
            }
            let scene = self.repo.get_scene(&emb.scene_id)?;
            let summary = self.repo.get_scene_summary(&emb.scene_id)?;
            scored.push(ScoredScene { scene, summary, score });
        }
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// `RetrieveForIntent` (spec §4.7 dispatch table).
    pub async fn retrieve_for_intent(&self, intent: Intent, script_id: &str, query: &str, hints: &RetrievalHints) -> Result<RetrievalResult> {
        match intent {
            Intent::LocalEdit => self.retrieve_local_edit(script_id, hints).await,
            Intent::SceneFeedback => self.retrieve_scene_feedback(script_id, query, hints).await,
            Intent::GlobalQuestion => self.retrieve_global_question(script_id, query).await,
            Intent::Brainstorm => self.retrieve_brainstorm(script_id, query).await,
        }
    }

    async fn retrieve_local_edit(&self, script_id: &str, hints: &RetrievalHints) -> Result<RetrievalResult> {
        let mut scenes = Vec::new();
        if let Some(pos) = hints.scene_position {
            let all = self.repo.list_scenes(script_id)?;
            for scene in all.into_iter().filter(|s| (s.position - pos).abs() <= 1) {
                let summary = self.repo.get_scene_summary(&scene.id)?;
                scenes.push(ScoredScene { scene, summary, score: 1.0 });
            }
        }
        Ok(RetrievalResult { scenes, ..Default::default() })
    }

    async fn retrieve_scene_feedback(&self, script_id: &str, query: &str, hints: &RetrievalHints) -> Result<RetrievalResult> {
        let mut scenes = Vec::new();
        let mut character_names: Vec<String> = Vec::new();

        if let Some(pos) = hints.scene_position {
            if let Some(hinted) = self.repo.list_scenes(script_id)?.into_iter().find(|s| s.position == pos) {
                character_names = self.repo.get_scene_characters(&hinted.id)?;
                let summary = self.repo.get_scene_summary(&hinted.id)?;
                scenes.push(ScoredScene { scene: hinted, summary, score: 1.0 });
            }
        }

        let neighbors = self.vector_search(script_id, query, 3, GENERAL_THRESHOLD).await?;
        for n in neighbors {
            if !scenes.iter().any(|s| s.scene.id == n.scene.id) {
                scenes.push(n);
            }
        }

        let mut character_sheets = Vec::new();
        for name in &character_names {
            character_sheets.push(self.repo.get_or_init_character_sheet(script_id, name)?);
        }

        Ok(RetrievalResult { scenes, character_sheets, ..Default::default() })
    }

    async fn retrieve_global_question(&self, script_id: &str, query: &str) -> Result<RetrievalResult> {
        let outline = self.repo.get_or_init_outline(script_id)?;
        let outline_is_stale = outline.is_stale;

        let scenes = self.vector_search(script_id, query, 8, GENERAL_THRESHOLD).await?;

        let names = self.repo.list_script_characters(script_id)?;
        let mut character_sheets = Vec::new();
        for name in &names {
            character_sheets.push(self.repo.get_or_init_character_sheet(script_id, name)?);
        }

        Ok(RetrievalResult { scenes, outline: Some(outline), outline_is_stale, character_sheets })
    }

    async fn retrieve_brainstorm(&self, script_id: &str, query: &str) -> Result<RetrievalResult> {
        let outline = self.repo.get_or_init_outline(script_id)?;
        let outline_is_stale = outline.is_stale;
        let scenes = self.vector_search(script_id, query, 5, GENERAL_THRESHOLD).await?;
        Ok(RetrievalResult { scenes, outline: Some(outline), outline_is_stale, ..Default::default() })
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }
}
