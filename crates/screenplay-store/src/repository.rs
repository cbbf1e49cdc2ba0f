use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use screenplay_core::types::{AnalysisState, Block};

use crate::error::{Result, StoreError};
use crate::types::*;

/// Typed access to scripts, scenes, and every derived artifact (C2).
///
/// Wraps a single SQLite connection behind a mutex, following the same
/// shared-connection pattern as the rest of the workspace: every
/// operation here takes the lock for the duration of its own
/// transaction and releases it on every exit path. Reads that don't
/// need transactional isolation (most `get_*` calls) still take the
/// lock, just without `BEGIN IMMEDIATE` — SQLite's own MVCC handles the
/// rest.
pub struct ScriptRepository {
    conn: Mutex<Connection>,
}

impl ScriptRepository {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // -- Script --------------------------------------------------------

    pub fn create_script(&self, owner_id: &str, title: &str) -> Result<Script> {
        let db = self.lock();
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO scripts (id, owner_id, title, analysis_state, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'empty', 0, ?4, ?4)",
            params![id, owner_id, title, now],
        )?;
        drop(db);
        self.get_script(&id)
    }

    pub fn get_script(&self, script_id: &str) -> Result<Script> {
        let db = self.lock();
        db.query_row(
            "SELECT id, owner_id, title, analysis_state, version, blocks, crdt_state,
                    content_fingerprint, last_state_transition, created_at, updated_at, updated_by
             FROM scripts WHERE id = ?1",
            params![script_id],
            row_to_script,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound {
            entity: "script".into(),
            id: script_id.to_string(),
        })
    }

    // -- Scene -----------------------------------------------------------

    /// Inserts a scene at the given position. Used by ingestion; callers
    /// are responsible for keeping positions dense and unique. `raw_text`
    /// carries unstructured source text for scenes ingested without
    /// `blocks` (spec §4.1's hash fallback chain).
    pub fn insert_scene(&self, script_id: &str, position: i64, heading: &str, blocks: &[Block], raw_text: Option<&str>) -> Result<Scene> {
        let db = self.lock();
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let blocks_json = serde_json::to_string(blocks)?;
        db.execute(
            "INSERT INTO scenes (id, script_id, position, heading, blocks, raw_text, version, content_hash, is_key_scene, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, 0, ?7, ?7)",
            params![id, script_id, position, heading, blocks_json, raw_text, now],
        )?;
        drop(db);
        self.get_scene(&id)
    }

    pub fn get_scene(&self, scene_id: &str) -> Result<Scene> {
        let db = self.lock();
        db.query_row(
            "SELECT id, script_id, position, heading, blocks, raw_text, version, content_hash, is_key_scene, created_at, updated_at
             FROM scenes WHERE id = ?1",
            params![scene_id],
            row_to_scene,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound {
            entity: "scene".into(),
            id: scene_id.to_string(),
        })
    }

    /// Scenes in position order, the ordering `RefreshOutline` and
    /// `AnalyzeScriptPartial/Full` both rely on (spec §4.5).
    pub fn list_scenes(&self, script_id: &str) -> Result<Vec<Scene>> {
        let db = self.lock();
        let mut stmt = db.prepare(
            "SELECT id, script_id, position, heading, blocks, raw_text, version, content_hash, is_key_scene, created_at, updated_at
             FROM scenes WHERE script_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![script_id], row_to_scene)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Updates a scene's heading/blocks and persists the new content hash
    /// in the same transaction as the content change (spec §4.2 contract).
    /// Returns the updated scene and whether the hash actually changed.
    pub fn update_scene_content(
        &self,
        scene_id: &str,
        heading: Option<&str>,
        blocks: Option<&[Block]>,
    ) -> Result<(Scene, bool)> {
        let mut db = self.lock();
        let tx = db.transaction()?;
        let (old_heading, old_blocks_json, old_raw_text, old_hash): (String, String, Option<String>, Option<String>) = tx.query_row(
            "SELECT heading, blocks, raw_text, content_hash FROM scenes WHERE id = ?1",
            params![scene_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;
        let new_heading = heading.map(String::from).unwrap_or(old_heading);
        let new_blocks: Vec<Block> = match blocks {
            Some(b) => b.to_vec(),
            None => serde_json::from_str(&old_blocks_json)?,
        };
        let new_hash = screenplay_core::hash::scene_hash(&new_blocks, old_raw_text.as_deref(), &new_heading);
        let changed = old_hash.as_deref() != Some(new_hash.as_str());
        let now = chrono::Utc::now().to_rfc3339();
        let blocks_json = serde_json::to_string(&new_blocks)?;
        tx.execute(
            "UPDATE scenes SET heading = ?1, blocks = ?2, content_hash = ?3, version = version + 1, updated_at = ?4
             WHERE id = ?5",
            params![new_heading, blocks_json, new_hash, now, scene_id],
        )?;
        tx.commit()?;
        drop(db);
        Ok((self.get_scene(scene_id)?, changed))
    }

    // -- SceneCharacter --------------------------------------------------

    /// Replaces the character links for a scene with exactly `names`.
    pub fn set_scene_characters(&self, scene_id: &str, script_id: &str, names: &[String]) -> Result<()> {
        let mut db = self.lock();
        let tx = db.transaction()?;
        tx.execute("DELETE FROM scene_characters WHERE scene_id = ?1", params![scene_id])?;
        for name in names {
            tx.execute(
                "INSERT OR IGNORE INTO scene_characters (scene_id, script_id, character_name) VALUES (?1, ?2, ?3)",
                params![scene_id, script_id, name],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_scene_characters(&self, scene_id: &str) -> Result<Vec<String>> {
        let db = self.lock();
        let mut stmt = db.prepare("SELECT character_name FROM scene_characters WHERE scene_id = ?1 ORDER BY character_name")?;
        let rows = stmt.query_map(params![scene_id], |row| row.get::<_, String>(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// All distinct characters linked to any scene in the script.
    pub fn list_script_characters(&self, script_id: &str) -> Result<Vec<String>> {
        let db = self.lock();
        let mut stmt = db.prepare(
            "SELECT DISTINCT character_name FROM scene_characters WHERE script_id = ?1 ORDER BY character_name",
        )?;
        let rows = stmt.query_map(params![script_id], |row| row.get::<_, String>(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Scenes linked to a given (script, character) pair, in position order.
    pub fn list_scenes_for_character(&self, script_id: &str, character_name: &str) -> Result<Vec<Scene>> {
        let db = self.lock();
        let mut stmt = db.prepare(
            "SELECT s.id, s.script_id, s.position, s.heading, s.blocks, s.raw_text, s.version, s.content_hash, s.is_key_scene, s.created_at, s.updated_at
             FROM scenes s JOIN scene_characters sc ON s.id = sc.scene_id
             WHERE sc.script_id = ?1 AND sc.character_name = ?2
             ORDER BY s.position",
        )?;
        let rows = stmt.query_map(params![script_id, character_name], row_to_scene)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // -- SceneSummary ------------------------------------------------------

    pub fn get_scene_summary(&self, scene_id: &str) -> Result<Option<SceneSummary>> {
        let db = self.lock();
        Ok(db
            .query_row(
                "SELECT scene_id, summary_text, token_estimate, version, generated_at
                 FROM scene_summaries WHERE scene_id = ?1",
                params![scene_id],
                row_to_scene_summary,
            )
            .optional()?)
    }

    /// Upserts a scene's summary and bumps its version (spec §4.5
    /// RefreshSceneSummary). Not itself transactional with staleness
    /// reset — scene summaries carry no is-stale flag, only a version.
    pub fn upsert_scene_summary(&self, scene_id: &str, summary_text: &str, token_estimate: i64) -> Result<SceneSummary> {
        let db = self.lock();
        let now = chrono::Utc::now().to_rfc3339();
        let prior_version: i64 = db
            .query_row(
                "SELECT version FROM scene_summaries WHERE scene_id = ?1",
                params![scene_id],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);
        db.execute(
            "INSERT INTO scene_summaries (scene_id, summary_text, token_estimate, version, generated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(scene_id) DO UPDATE SET
                summary_text = excluded.summary_text,
                token_estimate = excluded.token_estimate,
                version = excluded.version,
                generated_at = excluded.generated_at",
            params![scene_id, summary_text, token_estimate, prior_version + 1, now],
        )?;
        drop(db);
        Ok(self.get_scene_summary(scene_id)?.expect("just upserted"))
    }

    /// Every scene in the script paired with its summary (if any), in
    /// position order — the shape `RefreshOutline` consumes.
    pub fn list_scenes_with_summaries(&self, script_id: &str) -> Result<Vec<(Scene, Option<SceneSummary>)>> {
        let scenes = self.list_scenes(script_id)?;
        let mut out = Vec::with_capacity(scenes.len());
        for scene in scenes {
            let summary = self.get_scene_summary(&scene.id)?;
            out.push((scene, summary));
        }
        Ok(out)
    }

    // -- ScriptOutline -----------------------------------------------------

    pub fn get_or_init_outline(&self, script_id: &str) -> Result<ScriptOutline> {
        let db = self.lock();
        db.execute(
            "INSERT OR IGNORE INTO script_outlines (script_id, summary_text, token_estimate, is_stale, dirty_scene_count, version)
             VALUES (?1, '', 0, 1, 0, 0)",
            params![script_id],
        )?;
        Ok(db.query_row(
            "SELECT script_id, summary_text, token_estimate, is_stale, dirty_scene_count, version, generated_at
             FROM script_outlines WHERE script_id = ?1",
            params![script_id],
            row_to_outline,
        )?)
    }

    // -- CharacterSheet ------------------------------------------------------

    pub fn get_or_init_character_sheet(&self, script_id: &str, character_name: &str) -> Result<CharacterSheet> {
        let db = self.lock();
        db.execute(
            "INSERT OR IGNORE INTO character_sheets (script_id, character_name, summary_text, token_estimate, is_stale, dirty_scene_count, version)
             VALUES (?1, ?2, '', 0, 1, 0, 0)",
            params![script_id, character_name],
        )?;
        Ok(db.query_row(
            "SELECT script_id, character_name, summary_text, token_estimate, is_stale, dirty_scene_count, version, generated_at
             FROM character_sheets WHERE script_id = ?1 AND character_name = ?2",
            params![script_id, character_name],
            row_to_character_sheet,
        )?)
    }

    // -- SceneEmbedding ------------------------------------------------------

    pub fn upsert_scene_embedding(&self, scene_id: &str, vector: &[f32]) -> Result<SceneEmbedding> {
        let db = self.lock();
        let now = chrono::Utc::now().to_rfc3339();
        let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
        db.execute(
            "INSERT INTO scene_embeddings (scene_id, vector, generated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(scene_id) DO UPDATE SET vector = excluded.vector, generated_at = excluded.generated_at",
            params![scene_id, bytes, now],
        )?;
        Ok(SceneEmbedding {
            scene_id: scene_id.to_string(),
            vector: vector.to_vec(),
            generated_at: now,
        })
    }

    pub fn get_scene_embedding(&self, scene_id: &str) -> Result<Option<SceneEmbedding>> {
        let db = self.lock();
        Ok(db
            .query_row(
                "SELECT scene_id, vector, generated_at FROM scene_embeddings WHERE scene_id = ?1",
                params![scene_id],
                row_to_embedding,
            )
            .optional()?)
    }

    pub fn list_scene_embeddings(&self, script_id: &str) -> Result<Vec<SceneEmbedding>> {
        let db = self.lock();
        let mut stmt = db.prepare(
            "SELECT e.scene_id, e.vector, e.generated_at
             FROM scene_embeddings e JOIN scenes s ON e.scene_id = s.id
             WHERE s.script_id = ?1",
        )?;
        let rows = stmt.query_map(params![script_id], row_to_embedding)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // -- PlotThread / SceneRelationship --------------------------------------

    pub fn insert_plot_thread(&self, thread: &PlotThread) -> Result<()> {
        let db = self.lock();
        db.execute(
            "INSERT INTO plot_threads (id, script_id, kind, name, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                thread.id,
                thread.script_id,
                thread.kind.to_string(),
                thread.name,
                thread.description,
                thread.created_at
            ],
        )?;
        Ok(())
    }

    pub fn insert_scene_relationship(&self, rel: &SceneRelationship) -> Result<()> {
        let db = self.lock();
        db.execute(
            "INSERT INTO scene_relationships (id, script_id, from_scene_id, to_scene_id, kind, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                rel.id,
                rel.script_id,
                rel.from_scene_id,
                rel.to_scene_id,
                rel.kind.to_string(),
                rel.note,
                rel.created_at
            ],
        )?;
        Ok(())
    }

    // -- TokenUsage / OperationMetric -----------------------------------------

    pub fn record_token_usage(&self, usage: &TokenUsage) -> Result<i64> {
        let db = self.lock();
        db.execute(
            "INSERT INTO token_usage (script_id, model, input_tokens, cache_creation_tokens, cache_read_tokens,
                output_tokens, cost_usd, latency_ms, iteration, tool_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                usage.script_id,
                usage.model,
                usage.input_tokens,
                usage.cache_creation_tokens,
                usage.cache_read_tokens,
                usage.output_tokens,
                usage.cost_usd,
                usage.latency_ms,
                usage.iteration,
                usage.tool_name,
                usage.created_at,
            ],
        )?;
        Ok(db.last_insert_rowid())
    }
}

fn row_to_script(row: &rusqlite::Row<'_>) -> rusqlite::Result<Script> {
    let state_str: String = row.get(3)?;
    let blocks_json: Option<String> = row.get(5)?;
    Ok(Script {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        analysis_state: state_str.parse().unwrap_or(AnalysisState::Empty),
        version: row.get(4)?,
        blocks: blocks_json.and_then(|s| serde_json::from_str(&s).ok()),
        crdt_state: row.get(6)?,
        content_fingerprint: row.get(7)?,
        last_state_transition: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        updated_by: row.get(11)?,
    })
}

fn row_to_scene(row: &rusqlite::Row<'_>) -> rusqlite::Result<Scene> {
    let blocks_json: String = row.get(4)?;
    Ok(Scene {
        id: row.get(0)?,
        script_id: row.get(1)?,
        position: row.get(2)?,
        heading: row.get(3)?,
        blocks: serde_json::from_str(&blocks_json).unwrap_or_default(),
        raw_text: row.get(5)?,
        version: row.get(6)?,
        content_hash: row.get(7)?,
        is_key_scene: row.get::<_, i64>(8)? != 0,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn row_to_scene_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<SceneSummary> {
    Ok(SceneSummary {
        scene_id: row.get(0)?,
        summary_text: row.get(1)?,
        token_estimate: row.get(2)?,
        version: row.get(3)?,
        generated_at: row.get(4)?,
    })
}

fn row_to_outline(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScriptOutline> {
    Ok(ScriptOutline {
        script_id: row.get(0)?,
        summary_text: row.get(1)?,
        token_estimate: row.get(2)?,
        is_stale: row.get::<_, i64>(3)? != 0,
        dirty_scene_count: row.get(4)?,
        version: row.get(5)?,
        generated_at: row.get(6)?,
    })
}

fn row_to_character_sheet(row: &rusqlite::Row<'_>) -> rusqlite::Result<CharacterSheet> {
    Ok(CharacterSheet {
        script_id: row.get(0)?,
        character_name: row.get(1)?,
        summary_text: row.get(2)?,
        token_estimate: row.get(3)?,
        is_stale: row.get::<_, i64>(4)? != 0,
        dirty_scene_count: row.get(5)?,
        version: row.get(6)?,
        generated_at: row.get(7)?,
    })
}

fn row_to_embedding(row: &rusqlite::Row<'_>) -> rusqlite::Result<SceneEmbedding> {
    let bytes: Vec<u8> = row.get(1)?;
    let vector = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(SceneEmbedding {
        scene_id: row.get(0)?,
        vector,
        generated_at: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenplay_core::types::BlockType;

    fn repo() -> ScriptRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        ScriptRepository::new(conn)
    }

    #[test]
    fn create_and_fetch_script_round_trips() {
        let repo = repo();
        let script = repo.create_script("user-1", "My Screenplay").unwrap();
        assert_eq!(script.analysis_state, AnalysisState::Empty);
        assert_eq!(script.version, 0);

        let fetched = repo.get_script(&script.id).unwrap();
        assert_eq!(fetched.title, "My Screenplay");
    }

    #[test]
    fn update_scene_content_persists_hash_with_change() {
        let repo = repo();
        let script = repo.create_script("user-1", "Script").unwrap();
        let blocks = vec![Block::new(BlockType::Action, "John walks in.")];
        let scene = repo.insert_scene(&script.id, 0, "INT. HOUSE - DAY", &blocks, None).unwrap();
        assert!(scene.content_hash.is_none());

        let (updated, changed) = repo
            .update_scene_content(&scene.id, None, Some(&[Block::new(BlockType::Action, "John runs in.")]))
            .unwrap();
        assert!(changed);
        assert!(updated.content_hash.is_some());
        assert_eq!(updated.version, 1);
    }

    #[test]
    fn update_scene_content_with_same_text_reports_unchanged() {
        let repo = repo();
        let script = repo.create_script("user-1", "Script").unwrap();
        let blocks = vec![Block::new(BlockType::Action, "John walks in.")];
        let scene = repo.insert_scene(&script.id, 0, "INT. HOUSE - DAY", &blocks, None).unwrap();
        let (_, changed1) = repo.update_scene_content(&scene.id, None, Some(&blocks)).unwrap();
        assert!(changed1, "first hash assignment always counts as a change from null");

        let (_, changed2) = repo.update_scene_content(&scene.id, None, Some(&blocks)).unwrap();
        assert!(!changed2);
    }

    #[test]
    fn scene_summary_version_increments_on_each_upsert() {
        let repo = repo();
        let script = repo.create_script("user-1", "Script").unwrap();
        let scene = repo.insert_scene(&script.id, 0, "INT. HOUSE - DAY", &[], None).unwrap();
        let s1 = repo.upsert_scene_summary(&scene.id, "first pass", 10).unwrap();
        assert_eq!(s1.version, 1);
        let s2 = repo.upsert_scene_summary(&scene.id, "second pass", 12).unwrap();
        assert_eq!(s2.version, 2);
    }

    #[test]
    fn outline_initializes_stale_with_zero_dirty_count() {
        let repo = repo();
        let script = repo.create_script("user-1", "Script").unwrap();
        let outline = repo.get_or_init_outline(&script.id).unwrap();
        assert!(outline.is_stale);
        assert_eq!(outline.dirty_scene_count, 0);
    }
}
