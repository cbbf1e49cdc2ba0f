use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{ConversationError, Result};
use crate::types::{push_capped, ChatMessage, ConversationKey, ConversationState, ConversationSummary, Role};

/// Thread-safe manager for chat messages and short-term conversation
/// memory. One SQLite connection behind a `Mutex`, matching the
/// single-node sizing this subsystem targets.
pub struct ConversationManager {
    db: Mutex<Connection>,
}

impl ConversationManager {
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    /// Returns the conversation's short-term state, creating an empty
    /// one lazily on first access — no LLM call is made to create it.
    #[instrument(skip(self), fields(key = %key))]
    pub fn get_or_create_state(&self, key: &ConversationKey) -> Result<ConversationState> {
        if let Some(state) = self.get_state(key)? {
            debug!("conversation state cache hit");
            return Ok(state);
        }

        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO conversation_state
             (script_id, user_id, last_scene_ids, last_characters, last_thread_ids, message_count, updated_at)
             VALUES (?1, ?2, '[]', '[]', '[]', 0, ?3)",
            params![key.script_id, key.user_id, now],
        )?;
        row_to_state(&db, key)
    }

    pub fn get_state(&self, key: &ConversationKey) -> Result<Option<ConversationState>> {
        let db = self.db.lock().unwrap();
        match row_to_state(&db, key) {
            Ok(s) => Ok(Some(s)),
            Err(ConversationError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Appends one chat turn and bumps the state's `message_count`.
    #[instrument(skip(self, content), fields(key = %key, role = %role))]
    pub fn record_message(
        &self,
        key: &ConversationKey,
        role: Role,
        content: &str,
        token_count: Option<i64>,
        model: Option<&str>,
    ) -> Result<ChatMessage> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO chat_messages (id, script_id, user_id, role, content, token_count, model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![id, key.script_id, key.user_id, role.to_string(), content, token_count, model, now],
        )?;
        db.execute(
            "INSERT INTO conversation_state (script_id, user_id, last_scene_ids, last_characters, last_thread_ids, message_count, updated_at)
             VALUES (?1, ?2, '[]', '[]', '[]', 1, ?3)
             ON CONFLICT(script_id, user_id) DO UPDATE SET
                message_count = conversation_state.message_count + 1,
                updated_at = excluded.updated_at",
            params![key.script_id, key.user_id, now],
        )?;
        Ok(ChatMessage {
            id,
            script_id: key.script_id.clone(),
            user_id: key.user_id.clone(),
            role,
            content: content.to_string(),
            token_count,
            model: model.map(str::to_string),
            created_at: now,
        })
    }

    /// Lists messages for a conversation, oldest first.
    pub fn list_messages(&self, key: &ConversationKey, limit: usize) -> Result<Vec<ChatMessage>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, script_id, user_id, role, content, token_count, model, created_at
             FROM chat_messages WHERE script_id = ?1 AND user_id = ?2
             ORDER BY created_at DESC LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![key.script_id, key.user_id, limit as i64], row_to_message)?;
        let mut messages: Vec<ChatMessage> = rows.filter_map(|r| r.ok()).collect();
        messages.reverse();
        Ok(messages)
    }

    /// Updates the bounded `last_*` rings and last-intent/commitment.
    /// Pass `None` for fields the caller didn't observe this turn.
    pub fn note_reference(
        &self,
        key: &ConversationKey,
        scene_id: Option<&str>,
        characters: &[String],
        thread_id: Option<&str>,
        intent: Option<&str>,
        commitment: Option<&str>,
    ) -> Result<ConversationState> {
        let mut state = self.get_or_create_state(key)?;
        if let Some(scene_id) = scene_id {
            push_capped(&mut state.last_scene_ids, scene_id.to_string());
        }
        for character in characters {
            push_capped(&mut state.last_characters, character.clone());
        }
        if let Some(thread_id) = thread_id {
            push_capped(&mut state.last_thread_ids, thread_id.to_string());
        }
        if let Some(intent) = intent {
            state.last_intent = Some(intent.to_string());
        }
        if commitment.is_some() {
            state.last_commitment = commitment.map(str::to_string);
        }
        state.updated_at = chrono::Utc::now().to_rfc3339();

        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE conversation_state SET
                last_scene_ids = ?1, last_characters = ?2, last_thread_ids = ?3,
                last_intent = ?4, last_commitment = ?5, updated_at = ?6
             WHERE script_id = ?7 AND user_id = ?8",
            params![
                serde_json::to_string(&state.last_scene_ids)?,
                serde_json::to_string(&state.last_characters)?,
                serde_json::to_string(&state.last_thread_ids)?,
                state.last_intent,
                state.last_commitment,
                state.updated_at,
                key.script_id,
                key.user_id,
            ],
        )?;
        Ok(state)
    }

    /// True once `message_count` since the last summary crosses
    /// `threshold` (spec §4.8, default 15 —
    /// `ThresholdsConfig::conversation_summary_message_threshold`).
    pub fn should_summarize(&self, key: &ConversationKey, threshold: u32) -> Result<bool> {
        let state = self.get_or_create_state(key)?;
        Ok(state.message_count >= threshold as i64)
    }

    /// Returns the oldest `batch` messages not yet covered by a summary
    /// — candidates for rolling compression.
    pub fn oldest_uncovered_messages(&self, key: &ConversationKey, batch: usize) -> Result<Vec<ChatMessage>> {
        let covered_through = self.get_summary(key)?.and_then(|s| s.covered_through_message_id);
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, script_id, user_id, role, content, token_count, model, created_at
             FROM chat_messages WHERE script_id = ?1 AND user_id = ?2
             ORDER BY created_at ASC LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![key.script_id, key.user_id, batch as i64], row_to_message)?;
        let all: Vec<ChatMessage> = rows.filter_map(|r| r.ok()).collect();
        match covered_through {
            Some(last_id) => {
                let cut = all.iter().position(|m| m.id == last_id).map(|i| i + 1).unwrap_or(0);
                Ok(all.into_iter().skip(cut).collect())
            }
            None => Ok(all),
        }
    }

    pub fn get_summary(&self, key: &ConversationKey) -> Result<Option<ConversationSummary>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT script_id, user_id, summary_text, covered_through_message_id, created_at
             FROM conversation_summaries WHERE script_id = ?1 AND user_id = ?2",
            params![key.script_id, key.user_id],
            row_to_summary,
        )
        .optional()
        .map_err(ConversationError::Database)
    }

    /// Atomically records a new rolling summary and resets the
    /// message-count counter the threshold check reads — the caller
    /// supplies `summary_text` (produced upstream by an LLM call this
    /// crate never makes itself).
    pub fn apply_summary(&self, key: &ConversationKey, summary_text: &str, covered_through_message_id: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO conversation_summaries (script_id, user_id, summary_text, covered_through_message_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(script_id, user_id) DO UPDATE SET
                summary_text = excluded.summary_text,
                covered_through_message_id = excluded.covered_through_message_id,
                created_at = excluded.created_at",
            params![key.script_id, key.user_id, summary_text, covered_through_message_id, now],
        )?;
        db.execute(
            "UPDATE conversation_state SET message_count = 0 WHERE script_id = ?1 AND user_id = ?2",
            params![key.script_id, key.user_id],
        )?;
        Ok(())
    }
}

fn row_to_state(db: &Connection, key: &ConversationKey) -> Result<ConversationState> {
    db.query_row(
        "SELECT script_id, user_id, last_scene_ids, last_characters, last_thread_ids, last_intent, last_commitment, message_count, updated_at
         FROM conversation_state WHERE script_id = ?1 AND user_id = ?2",
        params![key.script_id, key.user_id],
        |row| {
            let scenes_json: String = row.get(2)?;
            let chars_json: String = row.get(3)?;
            let threads_json: String = row.get(4)?;
            Ok(ConversationState {
                script_id: row.get(0)?,
                user_id: row.get(1)?,
                last_scene_ids: serde_json::from_str(&scenes_json).unwrap_or_default(),
                last_characters: serde_json::from_str(&chars_json).unwrap_or_default(),
                last_thread_ids: serde_json::from_str(&threads_json).unwrap_or_default(),
                last_intent: row.get(5)?,
                last_commitment: row.get(6)?,
                message_count: row.get(7)?,
                updated_at: row.get(8)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => ConversationError::NotFound { key: key.format() },
        other => ConversationError::Database(other),
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    let role_str: String = row.get(3)?;
    Ok(ChatMessage {
        id: row.get(0)?,
        script_id: row.get(1)?,
        user_id: row.get(2)?,
        role: role_str.parse().unwrap_or(Role::User),
        content: row.get(4)?,
        token_count: row.get(5)?,
        model: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationSummary> {
    Ok(ConversationSummary {
        script_id: row.get(0)?,
        user_id: row.get(1)?,
        summary_text: row.get(2)?,
        covered_through_message_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn manager() -> ConversationManager {
        let conn = Connection::open_in_memory().unwrap();
        db::init_db(&conn).unwrap();
        ConversationManager::new(conn)
    }

    #[test]
    fn record_message_increments_state_message_count() {
        let mgr = manager();
        let key = ConversationKey::new("script-1", "user-1");
        mgr.record_message(&key, Role::User, "rewrite scene 3", None, None).unwrap();
        mgr.record_message(&key, Role::Assistant, "done", Some(120), Some("claude-haiku-4-5")).unwrap();

        let state = mgr.get_state(&key).unwrap().unwrap();
        assert_eq!(state.message_count, 2);
    }

    #[test]
    fn note_reference_caps_and_dedupes_last_scenes() {
        let mgr = manager();
        let key = ConversationKey::new("script-1", "user-1");
        for i in 0..7 {
            mgr.note_reference(&key, Some(&format!("scene-{i}")), &[], None, Some("local_edit"), None)
                .unwrap();
        }
        let state = mgr.get_state(&key).unwrap().unwrap();
        assert_eq!(state.last_scene_ids.len(), 5);
        assert_eq!(state.last_scene_ids[0], "scene-6");
        assert_eq!(state.last_intent.as_deref(), Some("local_edit"));
    }

    #[test]
    fn should_summarize_crosses_threshold_at_fifteen() {
        let mgr = manager();
        let key = ConversationKey::new("script-1", "user-1");
        for _ in 0..14 {
            mgr.record_message(&key, Role::User, "hi", None, None).unwrap();
        }
        assert!(!mgr.should_summarize(&key, 15).unwrap());
        mgr.record_message(&key, Role::User, "hi", None, None).unwrap();
        assert!(mgr.should_summarize(&key, 15).unwrap());
    }

    #[test]
    fn apply_summary_resets_message_count() {
        let mgr = manager();
        let key = ConversationKey::new("script-1", "user-1");
        let mut last_id = String::new();
        for _ in 0..15 {
            last_id = mgr.record_message(&key, Role::User, "hi", None, None).unwrap().id;
        }
        mgr.apply_summary(&key, "Discussed scenes 1-3.", &last_id).unwrap();
        let state = mgr.get_state(&key).unwrap().unwrap();
        assert_eq!(state.message_count, 0);
        let summary = mgr.get_summary(&key).unwrap().unwrap();
        assert_eq!(summary.covered_through_message_id, Some(last_id));
    }
}
