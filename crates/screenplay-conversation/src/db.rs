use rusqlite::Connection;

use crate::error::Result;

/// Initialises the chat-message log, conversation-state, and
/// conversation-summary tables. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS chat_messages (
            id          TEXT PRIMARY KEY,
            script_id   TEXT NOT NULL,
            user_id     TEXT NOT NULL,
            role        TEXT NOT NULL,
            content     TEXT NOT NULL,
            token_count INTEGER,
            model       TEXT,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_chat_messages_conversation
            ON chat_messages(script_id, user_id, created_at);

        CREATE TABLE IF NOT EXISTS conversation_state (
            script_id        TEXT NOT NULL,
            user_id          TEXT NOT NULL,
            last_scene_ids   TEXT NOT NULL DEFAULT '[]',
            last_characters  TEXT NOT NULL DEFAULT '[]',
            last_thread_ids  TEXT NOT NULL DEFAULT '[]',
            last_intent      TEXT,
            last_commitment  TEXT,
            message_count    INTEGER NOT NULL DEFAULT 0,
            updated_at       TEXT NOT NULL,
            PRIMARY KEY (script_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS conversation_summaries (
            script_id                  TEXT NOT NULL,
            user_id                    TEXT NOT NULL,
            summary_text               TEXT NOT NULL,
            covered_through_message_id TEXT,
            created_at                 TEXT NOT NULL,
            PRIMARY KEY (script_id, user_id)
        );",
    )?;
    Ok(())
}
