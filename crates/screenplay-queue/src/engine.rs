use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use crate::db::init_db;
use crate::error::{QueueError, Result};
use crate::types::{priority_rank, Job, JobKind, JobPriority, JobStatus};

/// Three priority lanes (urgent/normal/low), FIFO within a lane,
/// deduplicated on `JobKind::dedup_key`, with bounded retries before a
/// job is parked in the dead-letter lane (spec §4.4).
pub struct JobQueue {
    conn: Mutex<Connection>,
}

impl JobQueue {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Enqueues a unit of work. A no-op if a job with the same dedup
    /// key is already pending or running; re-enqueues fresh (attempts
    /// reset to 0) if the prior instance reached a terminal state.
    pub fn enqueue(&self, kind: JobKind, priority: JobPriority, max_retries: u32, timeout_secs: u64) -> Result<Job> {
        let id = kind.dedup_key();
        let conn = self.conn.lock().unwrap();

        if let Some(existing) = row_to_job(&conn, &id)? {
            if matches!(existing.status, JobStatus::Pending | JobStatus::Running) {
                return Ok(existing);
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let kind_json = serde_json::to_string(&kind)?;
        conn.execute(
            "INSERT INTO jobs (id, kind, priority, priority_rank, status, attempts, max_retries, timeout_secs, last_error, started_at, deadline_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5, ?6, NULL, NULL, NULL, ?7, ?7)
             ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                priority = excluded.priority,
                priority_rank = excluded.priority_rank,
                status = 'pending',
                attempts = 0,
                max_retries = excluded.max_retries,
                timeout_secs = excluded.timeout_secs,
                last_error = NULL,
                started_at = NULL,
                deadline_at = NULL,
                updated_at = excluded.updated_at",
            params![id, kind_json, priority.to_string(), priority_rank(priority), max_retries, timeout_secs, now],
        )?;
        info!(job_id = %id, %priority, "job enqueued");
        row_to_job(&conn, &id)?.ok_or_else(|| QueueError::JobNotFound { id: id.clone() })
    }

    /// Pops the oldest job in the highest-priority non-empty lane and
    /// marks it running with a deadline `timeout_secs` out (spec §4.4,
    /// testable property 11: priority lanes drain before lower ones,
    /// FIFO within a lane).
    pub fn dequeue(&self) -> Result<Option<Job>> {
        let conn = self.conn.lock().unwrap();
        let id: Option<String> = conn
            .query_row(
                "SELECT id FROM jobs WHERE status = 'pending' ORDER BY priority_rank ASC, created_at ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let Some(id) = id else { return Ok(None) };

        let now = chrono::Utc::now();
        let job = row_to_job(&conn, &id)?.ok_or_else(|| QueueError::JobNotFound { id: id.clone() })?;
        let deadline = now + chrono::Duration::seconds(job.timeout_secs as i64);
        conn.execute(
            "UPDATE jobs SET status = 'running', started_at = ?1, deadline_at = ?2, updated_at = ?1 WHERE id = ?3",
            params![now.to_rfc3339(), deadline.to_rfc3339(), id],
        )?;
        row_to_job(&conn, &id)
    }

    pub fn complete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let n = conn.execute(
            "UPDATE jobs SET status = 'completed', updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        if n == 0 {
            return Err(QueueError::JobNotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Records a failure. Requeues to pending if attempts remain under
    /// `max_retries`, otherwise moves the job to the dead-letter lane
    /// (spec §4.4: "after max_retries consecutive failures the job is
    /// parked for operator inspection rather than retried forever").
    pub fn fail(&self, id: &str, error: &str) -> Result<JobStatus> {
        let conn = self.conn.lock().unwrap();
        let job = row_to_job(&conn, id)?.ok_or_else(|| QueueError::JobNotFound { id: id.to_string() })?;
        let attempts = job.attempts + 1;
        let now = chrono::Utc::now().to_rfc3339();
        let next_status = if attempts >= job.max_retries {
            JobStatus::DeadLetter
        } else {
            JobStatus::Pending
        };
        conn.execute(
            "UPDATE jobs SET status = ?1, attempts = ?2, last_error = ?3, started_at = NULL, deadline_at = NULL, updated_at = ?4 WHERE id = ?5",
            params![next_status.to_string(), attempts, error, now, id],
        )?;
        if next_status == JobStatus::DeadLetter {
            warn!(job_id = %id, attempts, "job moved to dead letter after exhausting retries");
        }
        Ok(next_status)
    }

    /// Returns running jobs whose deadline has passed to pending so a
    /// crashed worker's job isn't stuck forever.
    pub fn reclaim_expired(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let n = conn.execute(
            "UPDATE jobs SET status = 'pending', started_at = NULL, deadline_at = NULL, updated_at = ?1
             WHERE status = 'running' AND deadline_at IS NOT NULL AND deadline_at < ?1",
            params![now],
        )?;
        if n > 0 {
            warn!(count = n, "reclaimed jobs past their deadline");
        }
        Ok(n)
    }

    pub fn list_dead_letters(&self) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, kind, priority, status, attempts, max_retries, timeout_secs, last_error, started_at, deadline_at, created_at, updated_at
             FROM jobs WHERE status = 'dead_letter' ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], job_from_row)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn requeue_dead_letter(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let n = conn.execute(
            "UPDATE jobs SET status = 'pending', attempts = 0, last_error = NULL, updated_at = ?1
             WHERE id = ?2 AND status = 'dead_letter'",
            params![now, id],
        )?;
        if n == 0 {
            return Err(QueueError::JobNotFound { id: id.to_string() });
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Job>> {
        let conn = self.conn.lock().unwrap();
        row_to_job(&conn, id)
    }
}

fn row_to_job(conn: &Connection, id: &str) -> Result<Option<Job>> {
    conn.query_row(
        "SELECT id, kind, priority, status, attempts, max_retries, timeout_secs, last_error, started_at, deadline_at, created_at, updated_at
         FROM jobs WHERE id = ?1",
        params![id],
        job_from_row,
    )
    .optional()
    .map_err(QueueError::Database)
}

fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let kind_json: String = row.get(1)?;
    let priority_str: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    Ok(Job {
        id: row.get(0)?,
        kind: serde_json::from_str(&kind_json).unwrap_or(JobKind::ScriptStateAdvance { script_id: String::new() }),
        priority: priority_str.parse().unwrap_or(JobPriority::Normal),
        status: status_str.parse().unwrap_or(JobStatus::Pending),
        attempts: row.get(4)?,
        max_retries: row.get(5)?,
        timeout_secs: row.get::<_, i64>(6)? as u64,
        last_error: row.get(7)?,
        started_at: row.get(8)?,
        deadline_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> JobQueue {
        let conn = Connection::open_in_memory().unwrap();
        JobQueue::new(conn).unwrap()
    }

    /// Testable property 11: urgent jobs dequeue before normal/low ones
    /// regardless of enqueue order; FIFO within a lane.
    #[test]
    fn dequeue_drains_urgent_before_normal_before_low() {
        let q = queue();
        q.enqueue(JobKind::RefreshOutline { script_id: "low-1".into() }, JobPriority::Low, 3, 300).unwrap();
        q.enqueue(JobKind::RefreshOutline { script_id: "normal-1".into() }, JobPriority::Normal, 3, 300).unwrap();
        q.enqueue(JobKind::AnalyzeScriptFull { script_id: "urgent-1".into() }, JobPriority::Urgent, 3, 600).unwrap();

        let first = q.dequeue().unwrap().unwrap();
        assert_eq!(first.priority, JobPriority::Urgent);
        let second = q.dequeue().unwrap().unwrap();
        assert_eq!(second.priority, JobPriority::Normal);
        let third = q.dequeue().unwrap().unwrap();
        assert_eq!(third.priority, JobPriority::Low);
        assert!(q.dequeue().unwrap().is_none());
    }

    #[test]
    fn duplicate_enqueue_while_pending_is_noop() {
        let q = queue();
        let kind = JobKind::RefreshSceneSummary { scene_id: "scene-1".into() };
        let first = q.enqueue(kind.clone(), JobPriority::Normal, 3, 300).unwrap();
        let second = q.enqueue(kind, JobPriority::Urgent, 3, 300).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.priority, JobPriority::Normal, "the original pending job's priority must not change");
    }

    #[test]
    fn fail_retries_until_max_then_dead_letters() {
        let q = queue();
        let kind = JobKind::RefreshOutline { script_id: "script-1".into() };
        q.enqueue(kind.clone(), JobPriority::Normal, 3, 300).unwrap();
        let id = kind.dedup_key();

        q.dequeue().unwrap();
        assert_eq!(q.fail(&id, "transient").unwrap(), JobStatus::Pending);

        q.dequeue().unwrap();
        assert_eq!(q.fail(&id, "transient").unwrap(), JobStatus::Pending);

        q.dequeue().unwrap();
        assert_eq!(q.fail(&id, "transient").unwrap(), JobStatus::DeadLetter);

        let dead = q.list_dead_letters().unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id, id);
    }

    #[test]
    fn requeue_dead_letter_resets_attempts() {
        let q = queue();
        let kind = JobKind::RefreshOutline { script_id: "script-2".into() };
        q.enqueue(kind.clone(), JobPriority::Normal, 1, 300).unwrap();
        let id = kind.dedup_key();
        q.dequeue().unwrap();
        q.fail(&id, "boom").unwrap();

        q.requeue_dead_letter(&id).unwrap();
        let job = q.get(&id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
    }
}
