use rusqlite::Connection;

use crate::error::Result;

/// Creates the CRDT update log and snapshot-metadata tables if absent.
/// Mirrors screenplay-store's `init_db` shape — idempotent, safe to call
/// on every process start.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_crdt_updates(conn)?;
    create_snapshot_metadata(conn)?;
    Ok(())
}

fn create_crdt_updates(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS crdt_updates (
            id TEXT PRIMARY KEY,
            parent_kind TEXT NOT NULL,
            parent_id TEXT NOT NULL,
            actor TEXT,
            bytes BLOB NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_crdt_updates_parent
            ON crdt_updates (parent_kind, parent_id, created_at)",
        [],
    )?;
    Ok(())
}

fn create_snapshot_metadata(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS snapshot_metadata (
            parent_kind TEXT NOT NULL,
            parent_id TEXT NOT NULL,
            source TEXT NOT NULL,
            update_count INTEGER NOT NULL,
            content_sha256 TEXT NOT NULL,
            generated_at TEXT NOT NULL,
            byte_size INTEGER NOT NULL,
            PRIMARY KEY (parent_kind, parent_id)
        )",
        [],
    )?;
    Ok(())
}
