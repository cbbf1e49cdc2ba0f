//! Refresh Workers (C5, spec §4.5).
//!
//! Consumes jobs from `screenplay_queue::JobQueue` and regenerates the
//! artifact each `JobKind` names, persisting through the
//! already-atomic `refresh_outline`/`refresh_character_sheet`/
//! `upsert_scene_summary` store methods, over the fixed job-kind
//! dispatch table spec §4.4/§4.5 define.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use screenplay_core::config::QueueConfig;
use screenplay_queue::{Job, JobKind, JobQueue};
use screenplay_store::ScriptRepository;

use crate::client::LlmClient;
use crate::error::Result;
use crate::provider::{ChatRequest, Message, Role};

const SCENE_SUMMARY_SYSTEM: &str = "Summarize this screenplay scene in five short labeled sections: Action, Conflict, Character Changes, Plot Progression, Tone.";
const OUTLINE_SYSTEM: &str = "Write a concise global outline of this screenplay from its per-scene summaries: overall arc, major turns, and how the throughlines connect.";
const CHARACTER_SHEET_SYSTEM: &str = "From these scenes featuring this character, write a character sheet: want/need, arc, key relationships, and pivotal moments.";

pub struct Workers {
    repo: Arc<ScriptRepository>,
    llm: Arc<LlmClient>,
    sonnet_model: String,
    haiku_model: String,
    embedding_model: String,
    queue_config: QueueConfig,
}

impl Workers {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<ScriptRepository>,
        llm: Arc<LlmClient>,
        sonnet_model: String,
        haiku_model: String,
        embedding_model: String,
        queue_config: QueueConfig,
    ) -> Self {
        Self { repo, llm, sonnet_model, haiku_model, embedding_model, queue_config }
    }

    /// Dispatches one job to its handler. The caller (the engine's
    /// worker-pool loop) owns `JobQueue::complete`/`fail` bookkeeping.
    pub async fn run_job(&self, job: &Job) -> Result<()> {
        match &job.kind {
            JobKind::RefreshSceneSummary { scene_id } => self.refresh_scene_summary(scene_id).await,
            JobKind::RefreshOutline { script_id } => self.refresh_outline(script_id).await,
            JobKind::RefreshCharacterSheet { script_id, character_name } => self.refresh_character_sheet(script_id, character_name).await,
            JobKind::AnalyzeScriptPartial { script_id } | JobKind::AnalyzeScriptFull { script_id } => self.analyze_script(script_id).await,
            JobKind::ScriptStateAdvance { script_id } => self.script_state_advance(script_id).await,
        }
    }

    /// Drains one job from `queue` and runs it, recording success/failure
    /// back onto the queue (spec §4.4: failed attempts retry up to
    /// `max_retries` before moving to the dead-letter lane).
    pub async fn drain_one(&self, queue: &JobQueue) -> Result<bool> {
        let Some(job) = queue.dequeue()? else {
            return Ok(false);
        };
        match self.run_job(&job).await {
            Ok(()) => {
                queue.complete(&job.id)?;
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "job failed");
                queue.fail(&job.id, &e.to_string())?;
            }
        }
        Ok(true)
    }

    /// Regenerates both the scene summary and its embedding (spec §4.5:
    /// embeddings are part of the same per-scene refresh contract as
    /// summaries, not only the whole-script batch pass in
    /// `refresh_embeddings`) so the urgent `RefreshSceneSummary` job a
    /// single scene edit enqueues doesn't leave a stale embedding behind.
    async fn refresh_scene_summary(&self, scene_id: &str) -> Result<()> {
        let scene = self.repo.get_scene(scene_id)?;
        let text = scene.blocks.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join("\n");
        let req = ChatRequest::new(&self.haiku_model, SCENE_SUMMARY_SYSTEM, vec![Message { role: Role::User, content: text }], 512);
        let resp = self.llm.complete(&req, "refresh_scene_summary", Some(&scene.script_id), None, None).await?;
        self.repo.upsert_scene_summary(scene_id, &resp.content, resp.usage.output_tokens as i64)?;

        let vectors = self
            .llm
            .embed(&self.embedding_model, &[resp.content.clone()], Some(&scene.script_id))
            .await?;
        if let Some(vector) = vectors.into_iter().next() {
            self.repo.upsert_scene_embedding(scene_id, &vector)?;
        }
        Ok(())
    }

    async fn refresh_outline(&self, script_id: &str) -> Result<()> {
        let scenes = self.repo.list_scenes_with_summaries(script_id)?;
        let joined = scenes
            .iter()
            .map(|(scene, summary)| format!("Scene {} ({}): {}", scene.position, scene.heading, summary.as_ref().map(|s| s.summary_text.as_str()).unwrap_or("")))
            .collect::<Vec<_>>()
            .join("\n");
        let req = ChatRequest::new(&self.sonnet_model, OUTLINE_SYSTEM, vec![Message { role: Role::User, content: joined }], 1024);
        let resp = self.llm.complete(&req, "refresh_outline", Some(script_id), None, None).await?;
        self.repo.refresh_outline(script_id, &resp.content, resp.usage.output_tokens as i64)?;
        Ok(())
    }

    async fn refresh_character_sheet(&self, script_id: &str, character_name: &str) -> Result<()> {
        let scenes = self.repo.list_scenes_for_character(script_id, character_name)?;
        let joined = scenes
            .iter()
            .map(|s| format!("Scene {} ({}): {}", s.position, s.heading, s.blocks.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join(" ")))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!("Character: {character_name}\n\n{joined}");
        let req = ChatRequest::new(&self.sonnet_model, CHARACTER_SHEET_SYSTEM, vec![Message { role: Role::User, content: prompt }], 768);
        let resp = self.llm.complete(&req, "refresh_character_sheet", Some(script_id), None, None).await?;
        self.repo.refresh_character_sheet(script_id, character_name, &resp.content, resp.usage.output_tokens as i64)?;
        Ok(())
    }

    /// Spec §4.5: scene summaries first (bounded by
    /// `max_concurrent_summaries`), then outline + sheets + embeddings in
    /// parallel (sheets bounded by `max_concurrent_sheets`). Failures in
    /// individual scene summaries are logged and skipped; an
    /// orchestrator-level failure (listing scenes/characters) is fatal.
    ///
    /// Scene selection is "null or stale hash" (spec §4.5), not just
    /// never-analyzed: `check_scene_staleness` recomputes and compares
    /// each scene's hash, catching scenes edited since their last
    /// summary (e.g. through the CRDT path) as well as ones never
    /// summarized at all.
    async fn analyze_script(&self, script_id: &str) -> Result<()> {
        let scenes = self.repo.list_scenes(script_id)?;
        let mut stale_scenes = Vec::new();
        for scene in &scenes {
            if self.repo.check_scene_staleness(&scene.id)? {
                stale_scenes.push(scene.clone());
            }
        }

        let summary_sem = Arc::new(Semaphore::new(self.queue_config.max_concurrent_summaries as usize));
        let summary_futs = stale_scenes.iter().map(|scene| {
            let sem = summary_sem.clone();
            async move {
                let _permit = sem.acquire().await.expect("semaphore not closed");
                if let Err(e) = self.refresh_scene_summary(&scene.id).await {
                    warn!(scene_id = %scene.id, error = %e, "scene summary refresh failed, skipping");
                }
            }
        });
        futures_util::future::join_all(summary_futs).await;

        let names = self.repo.list_script_characters(script_id)?;
        let sheet_sem = Arc::new(Semaphore::new(self.queue_config.max_concurrent_sheets as usize));
        let mut sheet_futs = Vec::new();
        for name in &names {
            let sem = sheet_sem.clone();
            sheet_futs.push(async move {
                let _permit = sem.acquire().await.expect("semaphore not closed");
                self.refresh_character_sheet(script_id, name).await
            });
        }
        let outline_fut = self.refresh_outline(script_id);
        let embeddings_fut = self.refresh_embeddings(script_id);

        let (outline_res, embeddings_res, sheet_results) = tokio::join!(outline_fut, embeddings_fut, futures_util::future::join_all(sheet_futs));
        outline_res?;
        embeddings_res?;
        for res in sheet_results {
            res?;
        }

        self.script_state_advance(script_id).await?;
        info!(script_id, "analyze_script complete");
        Ok(())
    }

    async fn refresh_embeddings(&self, script_id: &str) -> Result<()> {
        let scenes = self.repo.list_scenes_with_summaries(script_id)?;
        let batch_size = self.queue_config.embedding_batch_size as usize;
        for chunk in scenes.chunks(batch_size) {
            let texts: Vec<String> = chunk
                .iter()
                .map(|(scene, summary)| summary.as_ref().map(|s| s.summary_text.clone()).unwrap_or_else(|| scene_text(scene)))
                .collect();
            let vectors = self.llm.embed(&self.embedding_model, &texts, Some(script_id)).await?;
            for ((scene, _), vector) in chunk.iter().zip(vectors) {
                self.repo.upsert_scene_embedding(&scene.id, &vector)?;
            }
        }
        Ok(())
    }

    async fn script_state_advance(&self, script_id: &str) -> Result<()> {
        self.repo.advance_script_state(script_id)?;
        Ok(())
    }
}

fn scene_text(scene: &screenplay_store::types::Scene) -> String {
    scene.blocks.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join(" ")
}
