//! Staleness Tracker (C3, spec §4.3).
//!
//! Incremental dirty counters across artifact kinds. `on_scene_changed`
//! is the only mutating entrypoint — it is meant to run in the same
//! transaction as the scene edit that triggered it (spec §5: "the
//! staleness tracker updates counters atomically with the transaction
//! that modified the underlying scene — never asynchronously").

use rusqlite::params;
use screenplay_core::config::ThresholdsConfig;

use crate::error::Result;
use crate::repository::ScriptRepository;
use crate::types::StalenessReport;

impl ScriptRepository {
    /// Increments the outline's dirty-scene-count and every linked
    /// character sheet's dirty-scene-count by 1, marking is-stale when a
    /// counter crosses its threshold. Runs in one transaction.
    pub fn on_scene_changed(&self, scene_id: &str, thresholds: &ThresholdsConfig) -> Result<StalenessReport> {
        let mut db = self.lock();
        let tx = db.transaction()?;
        let mut report = StalenessReport::default();

        let script_id: String = tx.query_row("SELECT script_id FROM scenes WHERE id = ?1", params![scene_id], |row| row.get(0))?;

        tx.execute(
            "INSERT OR IGNORE INTO script_outlines (script_id, summary_text, token_estimate, is_stale, dirty_scene_count, version)
             VALUES (?1, '', 0, 1, 0, 0)",
            params![script_id],
        )?;
        tx.execute(
            "UPDATE script_outlines SET dirty_scene_count = dirty_scene_count + 1 WHERE script_id = ?1",
            params![script_id],
        )?;
        let outline_dirty: i64 = tx.query_row(
            "SELECT dirty_scene_count FROM script_outlines WHERE script_id = ?1",
            params![script_id],
            |row| row.get(0),
        )?;
        if outline_dirty >= thresholds.outline_stale_threshold as i64 {
            tx.execute("UPDATE script_outlines SET is_stale = 1 WHERE script_id = ?1", params![script_id])?;
            report.outline_became_stale = true;
        }

        let mut names_stmt = tx.prepare("SELECT character_name FROM scene_characters WHERE scene_id = ?1")?;
        let names: Vec<String> = names_stmt
            .query_map(params![scene_id], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();
        drop(names_stmt);

        for name in names {
            tx.execute(
                "INSERT OR IGNORE INTO character_sheets (script_id, character_name, summary_text, token_estimate, is_stale, dirty_scene_count, version)
                 VALUES (?1, ?2, '', 0, 1, 0, 0)",
                params![script_id, name],
            )?;
            tx.execute(
                "UPDATE character_sheets SET dirty_scene_count = dirty_scene_count + 1 WHERE script_id = ?1 AND character_name = ?2",
                params![script_id, name],
            )?;
            let char_dirty: i64 = tx.query_row(
                "SELECT dirty_scene_count FROM character_sheets WHERE script_id = ?1 AND character_name = ?2",
                params![script_id, name],
                |row| row.get(0),
            )?;
            if char_dirty >= thresholds.character_stale_threshold as i64 {
                tx.execute(
                    "UPDATE character_sheets SET is_stale = 1 WHERE script_id = ?1 AND character_name = ?2",
                    params![script_id, name],
                )?;
                report.characters_became_stale.push(name);
            }
        }

        tx.commit()?;
        Ok(report)
    }

    /// Predicate: is-stale AND dirty-count ≥ threshold (spec §4.3).
    pub fn should_refresh_outline(&self, script_id: &str, thresholds: &ThresholdsConfig) -> Result<bool> {
        let outline = self.get_or_init_outline(script_id)?;
        Ok(outline.is_stale && outline.dirty_scene_count >= thresholds.outline_stale_threshold as i64)
    }

    pub fn should_refresh_character(&self, script_id: &str, name: &str, thresholds: &ThresholdsConfig) -> Result<bool> {
        let sheet = self.get_or_init_character_sheet(script_id, name)?;
        Ok(sheet.is_stale && sheet.dirty_scene_count >= thresholds.character_stale_threshold as i64)
    }

    /// Atomically clears is-stale, zeroes dirty-count, and bumps version
    /// and generated_at alongside the new summary text — one atomic
    /// change, satisfying testable property 3 (refresh atomicity).
    pub fn refresh_outline(&self, script_id: &str, summary_text: &str, token_estimate: i64) -> Result<crate::types::ScriptOutline> {
        let db = self.lock();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO script_outlines (script_id, summary_text, token_estimate, is_stale, dirty_scene_count, version, generated_at)
             VALUES (?1, ?2, ?3, 0, 0, 1, ?4)
             ON CONFLICT(script_id) DO UPDATE SET
                summary_text = excluded.summary_text,
                token_estimate = excluded.token_estimate,
                is_stale = 0,
                dirty_scene_count = 0,
                version = script_outlines.version + 1,
                generated_at = excluded.generated_at",
            params![script_id, summary_text, token_estimate, now],
        )?;
        Ok(db.query_row(
            "SELECT script_id, summary_text, token_estimate, is_stale, dirty_scene_count, version, generated_at
             FROM script_outlines WHERE script_id = ?1",
            params![script_id],
            |row| {
                Ok(crate::types::ScriptOutline {
                    script_id: row.get(0)?,
                    summary_text: row.get(1)?,
                    token_estimate: row.get(2)?,
                    is_stale: row.get::<_, i64>(3)? != 0,
                    dirty_scene_count: row.get(4)?,
                    version: row.get(5)?,
                    generated_at: row.get(6)?,
                })
            },
        )?)
    }

    pub fn refresh_character_sheet(
        &self,
        script_id: &str,
        character_name: &str,
        summary_text: &str,
        token_estimate: i64,
    ) -> Result<crate::types::CharacterSheet> {
        let db = self.lock();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO character_sheets (script_id, character_name, summary_text, token_estimate, is_stale, dirty_scene_count, version, generated_at)
             VALUES (?1, ?2, ?3, ?4, 0, 0, 1, ?5)
             ON CONFLICT(script_id, character_name) DO UPDATE SET
                summary_text = excluded.summary_text,
                token_estimate = excluded.token_estimate,
                is_stale = 0,
                dirty_scene_count = 0,
                version = character_sheets.version + 1,
                generated_at = excluded.generated_at",
            params![script_id, character_name, summary_text, token_estimate, now],
        )?;
        Ok(db.query_row(
            "SELECT script_id, character_name, summary_text, token_estimate, is_stale, dirty_scene_count, version, generated_at
             FROM character_sheets WHERE script_id = ?1 AND character_name = ?2",
            params![script_id, character_name],
            |row| {
                Ok(crate::types::CharacterSheet {
                    script_id: row.get(0)?,
                    character_name: row.get(1)?,
                    summary_text: row.get(2)?,
                    token_estimate: row.get(3)?,
                    is_stale: row.get::<_, i64>(4)? != 0,
                    dirty_scene_count: row.get(5)?,
                    version: row.get(6)?,
                    generated_at: row.get(7)?,
                })
            },
        )?)
    }

    /// Recomputes a scene's content hash and compares against the stored
    /// one. Returns true (and persists the new hash) if different.
    pub fn check_scene_staleness(&self, scene_id: &str) -> Result<bool> {
        let scene = self.get_scene(scene_id)?;
        let new_hash = screenplay_core::hash::scene_hash(&scene.blocks, scene.raw_text.as_deref(), &scene.heading);
        if scene.content_hash.as_deref() == Some(new_hash.as_str()) {
            return Ok(false);
        }
        let db = self.lock();
        db.execute(
            "UPDATE scenes SET content_hash = ?1 WHERE id = ?2",
            params![new_hash, scene_id],
        )?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use rusqlite::Connection;
    use screenplay_core::types::{Block, BlockType};

    fn repo_with_scene() -> (ScriptRepository, String, String) {
        let conn = Connection::open_in_memory().unwrap();
        db::init_db(&conn).unwrap();
        let repo = ScriptRepository::new(conn);
        let script = repo.create_script("user-1", "Script").unwrap();
        let scene = repo
            .insert_scene(&script.id, 0, "INT. HOUSE - DAY", &[Block::new(BlockType::Action, "Hi.")], None)
            .unwrap();
        repo.set_scene_characters(&scene.id, &script.id, &["JANE".to_string()]).unwrap();
        (repo, script.id, scene.id)
    }

    /// Scenario S2 (spec §8): 4 calls leave (dirty=4, stale=false); the
    /// 5th call crosses the outline threshold (5) and sets stale=true.
    #[test]
    fn outline_crosses_threshold_on_fifth_change() {
        let (repo, script_id, scene_id) = repo_with_scene();
        let thresholds = ThresholdsConfig::default();

        for _ in 0..4 {
            repo.on_scene_changed(&scene_id, &thresholds).unwrap();
        }
        let outline = repo.get_or_init_outline(&script_id).unwrap();
        assert_eq!(outline.dirty_scene_count, 4);
        assert!(!outline.is_stale);

        let report = repo.on_scene_changed(&scene_id, &thresholds).unwrap();
        assert!(report.outline_became_stale);
        let outline = repo.get_or_init_outline(&script_id).unwrap();
        assert_eq!(outline.dirty_scene_count, 5);
        assert!(outline.is_stale);
    }

    #[test]
    fn character_sheet_crosses_threshold_at_three() {
        let (repo, script_id, scene_id) = repo_with_scene();
        let thresholds = ThresholdsConfig::default();

        repo.on_scene_changed(&scene_id, &thresholds).unwrap();
        repo.on_scene_changed(&scene_id, &thresholds).unwrap();
        let report = repo.on_scene_changed(&scene_id, &thresholds).unwrap();
        assert_eq!(report.characters_became_stale, vec!["JANE".to_string()]);

        let sheet = repo.get_or_init_character_sheet(&script_id, "JANE").unwrap();
        assert!(sheet.is_stale);
        assert_eq!(sheet.dirty_scene_count, 3);
    }

    #[test]
    fn refresh_outline_resets_atomically() {
        let (repo, script_id, scene_id) = repo_with_scene();
        let thresholds = ThresholdsConfig::default();
        for _ in 0..5 {
            repo.on_scene_changed(&scene_id, &thresholds).unwrap();
        }
        let refreshed = repo.refresh_outline(&script_id, "Global summary.", 42).unwrap();
        assert!(!refreshed.is_stale);
        assert_eq!(refreshed.dirty_scene_count, 0);
        assert_eq!(refreshed.version, 1);
        assert!(refreshed.generated_at.is_some());
    }
}
