//! CAS Writer (C10, spec §4.10).
//!
//! Guards non-CRDT document updates with compare-and-swap on the
//! script's `version` column, plus an idempotency ledger keyed by
//! caller-supplied op-id.

use rusqlite::{params, OptionalExtension};
use screenplay_core::types::Block;

use crate::error::Result;
use crate::types::{CasConflict, CasSuccess, SceneDelta, VersionHistoryEntry};

/// Either the CAS succeeded or the caller's base_version was stale.
#[derive(Debug, Clone)]
pub enum CasOutcome {
    Success(CasSuccess),
    Conflict(CasConflict),
}

impl super::repository::ScriptRepository {
    /// `UpdateWithCAS` (spec §4.10). Idempotent on `op_id`: a replayed
    /// op-id within the retention window returns the original result
    /// without performing any additional write (testable property 5).
    pub fn update_with_cas(
        &self,
        script_id: &str,
        user: &str,
        base_version: i64,
        new_blocks: &[Block],
        scene_deltas: &[SceneDelta],
        op_id: &str,
    ) -> Result<CasOutcome> {
        if let Some(cached) = self.lookup_write_op(op_id)? {
            return Ok(cached);
        }

        let mut db = self.lock();
        let tx = db.transaction()?;

        let (current_version, _): (i64, String) = tx.query_row(
            "SELECT version, updated_at FROM scripts WHERE id = ?1",
            params![script_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        if current_version != base_version {
            let blocks_json: Option<String> = tx.query_row(
                "SELECT blocks FROM scripts WHERE id = ?1",
                params![script_id],
                |row| row.get(0),
            )?;
            let updated_at: String = tx.query_row(
                "SELECT updated_at FROM scripts WHERE id = ?1",
                params![script_id],
                |row| row.get(0),
            )?;
            let conflict = CasConflict {
                latest_version: current_version,
                latest_blocks: blocks_json.and_then(|s| serde_json::from_str(&s).ok()),
                latest_updated_at: updated_at,
            };
            // Per spec §5: a cancelled/rejected CAS attempt rolls back and
            // does not persist to the write-op ledger.
            tx.rollback()?;
            return Ok(CasOutcome::Conflict(conflict));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let new_version = current_version + 1;
        let blocks_json = serde_json::to_string(new_blocks)?;
        tx.execute(
            "UPDATE scripts SET version = ?1, blocks = ?2, updated_at = ?3, updated_by = ?4 WHERE id = ?5",
            params![new_version, blocks_json, now, user, script_id],
        )?;

        // Spec §4.10 step 4: append a version-history row in the same
        // transaction as the version bump.
        tx.execute(
            "INSERT INTO script_version_history (script_id, version, updated_by, blocks, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![script_id, new_version, user, blocks_json, now],
        )?;

        for delta in scene_deltas {
            apply_scene_delta(&tx, delta)?;
        }

        tx.commit()?;
        drop(db);

        let outcome = CasOutcome::Success(CasSuccess {
            version: new_version,
            updated_at: now,
        });
        self.record_write_op(op_id, script_id, &outcome)?;
        Ok(outcome)
    }

    fn lookup_write_op(&self, op_id: &str) -> Result<Option<CasOutcome>> {
        let db = self.lock();
        let row: Option<String> = db
            .query_row("SELECT result FROM write_ops WHERE op_id = ?1", params![op_id], |row| row.get(0))
            .optional()?;
        match row {
            Some(json) => Ok(Some(serde_json::from_str::<StoredCasOutcome>(&json)?.into())),
            None => Ok(None),
        }
    }

    fn record_write_op(&self, op_id: &str, script_id: &str, outcome: &CasOutcome) -> Result<()> {
        let db = self.lock();
        let now = chrono::Utc::now().to_rfc3339();
        let json = serde_json::to_string(&StoredCasOutcome::from(outcome.clone()))?;
        db.execute(
            "INSERT INTO write_ops (op_id, script_id, result, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![op_id, script_id, json, now],
        )?;
        Ok(())
    }

    /// Reads the version trail for a script, newest first.
    pub fn list_version_history(&self, script_id: &str) -> Result<Vec<VersionHistoryEntry>> {
        let db = self.lock();
        let mut stmt = db.prepare(
            "SELECT script_id, version, updated_by, blocks, created_at
             FROM script_version_history WHERE script_id = ?1 ORDER BY version DESC",
        )?;
        let rows = stmt.query_map(params![script_id], |row| {
            let blocks_json: String = row.get(3)?;
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?, blocks_json, row.get::<_, String>(4)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (script_id, version, updated_by, blocks_json, created_at) = row?;
            let blocks: Vec<Block> = serde_json::from_str(&blocks_json)?;
            out.push(VersionHistoryEntry { script_id, version, updated_by, blocks, created_at });
        }
        Ok(out)
    }

    /// Garbage-collects write-op ledger rows older than `retention_days`
    /// (spec §4.10: "op-ids older than 30 days may be garbage-collected").
    pub fn gc_write_ops(&self, retention_days: i64) -> Result<usize> {
        let db = self.lock();
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(retention_days)).to_rfc3339();
        let n = db.execute("DELETE FROM write_ops WHERE created_at < ?1", params![cutoff])?;
        Ok(n)
    }
}

fn apply_scene_delta(tx: &rusqlite::Transaction<'_>, delta: &SceneDelta) -> Result<()> {
    let (heading, position, blocks_json, raw_text): (String, i64, String, Option<String>) = tx.query_row(
        "SELECT heading, position, blocks, raw_text FROM scenes WHERE id = ?1",
        params![delta.scene_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;
    let new_heading = delta.heading.clone().unwrap_or(heading);
    let new_position = delta.position.unwrap_or(position);
    let new_blocks_json = match &delta.blocks {
        Some(blocks) => serde_json::to_string(blocks)?,
        None => blocks_json,
    };
    let new_blocks: Vec<Block> = serde_json::from_str(&new_blocks_json)?;
    let new_hash = screenplay_core::hash::scene_hash(&new_blocks, raw_text.as_deref(), &new_heading);
    let now = chrono::Utc::now().to_rfc3339();
    tx.execute(
        "UPDATE scenes SET heading = ?1, position = ?2, blocks = ?3, content_hash = ?4, version = version + 1, updated_at = ?5
         WHERE id = ?6",
        params![new_heading, new_position, new_blocks_json, new_hash, now, delta.scene_id],
    )?;
    Ok(())
}

/// JSON-stable wire shape for the write-op ledger; `CasConflict` and
/// `CasSuccess` both derive `Serialize`/`Deserialize` directly, but the
/// outcome needs a tag to round-trip through `write_ops.result`.
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(tag = "outcome")]
enum StoredCasOutcome {
    Success(CasSuccess),
    Conflict(CasConflict),
}

impl From<CasOutcome> for StoredCasOutcome {
    fn from(o: CasOutcome) -> Self {
        match o {
            CasOutcome::Success(s) => StoredCasOutcome::Success(s),
            CasOutcome::Conflict(c) => StoredCasOutcome::Conflict(c),
        }
    }
}

impl From<StoredCasOutcome> for CasOutcome {
    fn from(o: StoredCasOutcome) -> Self {
        match o {
            StoredCasOutcome::Success(s) => CasOutcome::Success(s),
            StoredCasOutcome::Conflict(c) => CasOutcome::Conflict(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::repository::ScriptRepository;
    use rusqlite::Connection;
    use screenplay_core::types::{Block, BlockType};

    fn repo() -> (ScriptRepository, String) {
        let conn = Connection::open_in_memory().unwrap();
        db::init_db(&conn).unwrap();
        let repo = ScriptRepository::new(conn);
        let script = repo.create_script("user-1", "Script").unwrap();
        (repo, script.id)
    }

    /// Scenario S3: first writer at base=0 succeeds; second writer still
    /// at base=0 gets a VersionConflict carrying version=1.
    #[test]
    fn concurrent_cas_yields_one_success_and_one_conflict() {
        let (repo, script_id) = repo();
        let blocks = vec![Block::new(BlockType::Action, "A")];

        let first = repo
            .update_with_cas(&script_id, "alice", 0, &blocks, &[], "op-a")
            .unwrap();
        assert!(matches!(first, CasOutcome::Success(ref s) if s.version == 1));

        let second = repo
            .update_with_cas(&script_id, "bob", 0, &blocks, &[], "op-b")
            .unwrap();
        match second {
            CasOutcome::Conflict(c) => assert_eq!(c.latest_version, 1),
            CasOutcome::Success(_) => panic!("expected conflict"),
        }
    }

    /// Scenario S4: replaying the same op-id returns the original result
    /// and does not bump the version again.
    #[test]
    fn idempotent_replay_returns_original_result() {
        let (repo, script_id) = repo();
        let blocks = vec![Block::new(BlockType::Action, "A")];

        let first = repo
            .update_with_cas(&script_id, "alice", 0, &blocks, &[], "op-42")
            .unwrap();
        let CasOutcome::Success(first) = first else {
            panic!("expected success")
        };
        assert_eq!(first.version, 1);

        let replay = repo
            .update_with_cas(&script_id, "alice", 0, &blocks, &[], "op-42")
            .unwrap();
        let CasOutcome::Success(replay) = replay else {
            panic!("expected success")
        };
        assert_eq!(replay.version, 1);

        let script = repo.get_script(&script_id).unwrap();
        assert_eq!(script.version, 1, "replay must not perform an additional write");
    }

    /// Spec §4.10 step 4: a successful CAS write appends exactly one
    /// version-history row; a replayed op-id or a rejected conflict
    /// appends none.
    #[test]
    fn successful_cas_appends_one_history_row() {
        let (repo, script_id) = repo();
        let blocks = vec![Block::new(BlockType::Action, "A")];

        repo.update_with_cas(&script_id, "alice", 0, &blocks, &[], "op-a").unwrap();
        repo.update_with_cas(&script_id, "alice", 0, &blocks, &[], "op-a").unwrap();
        let conflict_blocks = vec![Block::new(BlockType::Action, "B")];
        repo.update_with_cas(&script_id, "bob", 0, &conflict_blocks, &[], "op-b").unwrap();

        let history = repo.list_version_history(&script_id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version, 1);
        assert_eq!(history[0].updated_by, "alice");
    }
}
