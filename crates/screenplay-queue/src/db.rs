use rusqlite::Connection;

use crate::error::Result;

/// Initialises the `jobs` table (idempotent) and a priority/FIFO index
/// that matches the dequeue query's `ORDER BY priority, created_at`.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id           TEXT    NOT NULL PRIMARY KEY,
            kind          TEXT    NOT NULL,   -- JSON-encoded JobKind enum
            priority      TEXT    NOT NULL,
            priority_rank INTEGER NOT NULL,   -- 0=urgent, 1=normal, 2=low; lower sorts first
            status        TEXT    NOT NULL DEFAULT 'pending',
            attempts     INTEGER NOT NULL DEFAULT 0,
            max_retries  INTEGER NOT NULL,
            timeout_secs INTEGER NOT NULL,
            last_error   TEXT,
            started_at   TEXT,
            deadline_at  TEXT,
            created_at   TEXT    NOT NULL,
            updated_at   TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_pending_priority
            ON jobs (status, priority_rank, created_at);
        ",
    )?;
    Ok(())
}
