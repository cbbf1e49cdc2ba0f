use rusqlite::{Connection, Result};

/// Initialise the schema. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_scripts_table(conn)?;
    create_scenes_table(conn)?;
    create_scene_summaries_table(conn)?;
    create_outlines_table(conn)?;
    create_character_sheets_table(conn)?;
    create_scene_characters_table(conn)?;
    create_scene_embeddings_table(conn)?;
    create_plot_threads_table(conn)?;
    create_scene_relationships_table(conn)?;
    create_write_ops_table(conn)?;
    create_token_usage_table(conn)?;
    create_operation_metrics_table(conn)?;
    create_script_version_history_table(conn)?;
    Ok(())
}

fn create_scripts_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS scripts (
            id                    TEXT PRIMARY KEY,
            owner_id              TEXT NOT NULL,
            title                 TEXT NOT NULL,
            analysis_state        TEXT NOT NULL DEFAULT 'empty',
            version               INTEGER NOT NULL DEFAULT 0,
            blocks                TEXT,
            crdt_state            BLOB,
            content_fingerprint   TEXT,
            last_state_transition TEXT,
            created_at            TEXT NOT NULL,
            updated_at            TEXT NOT NULL,
            updated_by            TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_scripts_owner ON scripts(owner_id);",
    )
}

fn create_scenes_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS scenes (
            id            TEXT PRIMARY KEY,
            script_id     TEXT NOT NULL,
            position      INTEGER NOT NULL,
            heading       TEXT NOT NULL,
            blocks        TEXT NOT NULL DEFAULT '[]',
            raw_text      TEXT,
            version       INTEGER NOT NULL DEFAULT 0,
            content_hash  TEXT,
            is_key_scene  INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL,
            UNIQUE(script_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_scenes_script ON scenes(script_id, position);",
    )
}

fn create_scene_summaries_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS scene_summaries (
            scene_id      TEXT PRIMARY KEY,
            summary_text  TEXT NOT NULL,
            token_estimate INTEGER NOT NULL DEFAULT 0,
            version       INTEGER NOT NULL DEFAULT 0,
            generated_at  TEXT NOT NULL
        );",
    )
}

fn create_outlines_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS script_outlines (
            script_id         TEXT PRIMARY KEY,
            summary_text      TEXT NOT NULL DEFAULT '',
            token_estimate    INTEGER NOT NULL DEFAULT 0,
            is_stale          INTEGER NOT NULL DEFAULT 1,
            dirty_scene_count INTEGER NOT NULL DEFAULT 0,
            version           INTEGER NOT NULL DEFAULT 0,
            generated_at      TEXT
        );",
    )
}

fn create_character_sheets_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS character_sheets (
            script_id         TEXT NOT NULL,
            character_name    TEXT NOT NULL,
            summary_text      TEXT NOT NULL DEFAULT '',
            token_estimate    INTEGER NOT NULL DEFAULT 0,
            is_stale          INTEGER NOT NULL DEFAULT 1,
            dirty_scene_count INTEGER NOT NULL DEFAULT 0,
            version           INTEGER NOT NULL DEFAULT 0,
            generated_at      TEXT,
            PRIMARY KEY(script_id, character_name)
        );",
    )
}

fn create_scene_characters_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS scene_characters (
            scene_id       TEXT NOT NULL,
            script_id      TEXT NOT NULL,
            character_name TEXT NOT NULL,
            PRIMARY KEY(scene_id, character_name)
        );
        CREATE INDEX IF NOT EXISTS idx_scene_characters_script
            ON scene_characters(script_id, character_name);",
    )
}

fn create_scene_embeddings_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS scene_embeddings (
            scene_id     TEXT PRIMARY KEY,
            vector       BLOB NOT NULL,
            generated_at TEXT NOT NULL
        );",
    )
}

fn create_plot_threads_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS plot_threads (
            id          TEXT PRIMARY KEY,
            script_id   TEXT NOT NULL,
            kind        TEXT NOT NULL,
            name        TEXT NOT NULL,
            description TEXT,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_plot_threads_script ON plot_threads(script_id);",
    )
}

fn create_scene_relationships_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS scene_relationships (
            id            TEXT PRIMARY KEY,
            script_id     TEXT NOT NULL,
            from_scene_id TEXT NOT NULL,
            to_scene_id   TEXT NOT NULL,
            kind          TEXT NOT NULL,
            note          TEXT,
            created_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_scene_relationships_script
            ON scene_relationships(script_id);",
    )
}

/// Idempotency ledger for CAS writes (C10). Rows older than 30 days may
/// be garbage-collected by `cas::gc_write_ops`.
fn create_write_ops_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS write_ops (
            op_id      TEXT PRIMARY KEY,
            script_id  TEXT NOT NULL,
            result     TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_write_ops_created ON write_ops(created_at);",
    )
}

fn create_token_usage_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS token_usage (
            id                     INTEGER PRIMARY KEY AUTOINCREMENT,
            script_id              TEXT,
            model                  TEXT NOT NULL,
            input_tokens           INTEGER NOT NULL DEFAULT 0,
            cache_creation_tokens  INTEGER NOT NULL DEFAULT 0,
            cache_read_tokens      INTEGER NOT NULL DEFAULT 0,
            output_tokens          INTEGER NOT NULL DEFAULT 0,
            cost_usd               REAL NOT NULL DEFAULT 0,
            latency_ms             INTEGER NOT NULL DEFAULT 0,
            iteration              INTEGER,
            tool_name              TEXT,
            created_at             TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_token_usage_script ON token_usage(script_id, created_at);",
    )
}

/// Append-only history row written alongside every successful CAS write
/// (spec §4.10 step 4), one entry per version bump. Distinct from the
/// CRDT update log in `screenplay-crdt` — this is the non-CRDT writer's
/// own version trail.
fn create_script_version_history_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS script_version_history (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            script_id  TEXT NOT NULL,
            version    INTEGER NOT NULL,
            updated_by TEXT NOT NULL,
            blocks     TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_script_version_history_script
            ON script_version_history(script_id, version);",
    )
}

fn create_operation_metrics_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS operation_metrics (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            operation   TEXT NOT NULL,
            script_id   TEXT,
            success     INTEGER NOT NULL,
            latency_ms  INTEGER NOT NULL,
            error_kind  TEXT,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_operation_metrics_op
            ON operation_metrics(operation, created_at DESC);",
    )
}
