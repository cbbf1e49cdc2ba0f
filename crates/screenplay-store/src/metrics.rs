//! Operation metric recording (ambient stack supplement — SPEC_FULL.md
//! §3). The spec carries no metrics-export surface, so `OperationMetric`
//! rows are the only durable record of operation latency/outcome,
//! written alongside a `tracing` log line at the call site.

use rusqlite::params;

use crate::error::Result;
use crate::repository::ScriptRepository;
use crate::types::OperationMetric;

impl ScriptRepository {
    pub fn record_operation_metric(
        &self,
        operation: &str,
        script_id: Option<&str>,
        success: bool,
        latency_ms: i64,
        error_kind: Option<&str>,
    ) -> Result<i64> {
        let db = self.lock();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO operation_metrics (operation, script_id, success, latency_ms, error_kind, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![operation, script_id, success, latency_ms, error_kind, now],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub fn recent_operation_metrics(&self, operation: &str, limit: usize) -> Result<Vec<OperationMetric>> {
        let db = self.lock();
        let mut stmt = db.prepare(
            "SELECT id, operation, script_id, success, latency_ms, error_kind, created_at
             FROM operation_metrics WHERE operation = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![operation, limit], |row| {
            Ok(OperationMetric {
                id: row.get(0)?,
                operation: row.get(1)?,
                script_id: row.get(2)?,
                success: row.get::<_, i64>(3)? != 0,
                latency_ms: row.get(4)?,
                error_kind: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}
