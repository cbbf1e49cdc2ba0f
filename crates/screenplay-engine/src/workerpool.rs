//! Background worker pool (spec §5): a task-spawn loop, independent of
//! the request-handling pool, that drains `JobQueue` and dispatches each
//! job to `Workers::run_job`. `JobQueue::dequeue` already enforces the
//! urgent/normal/low drain order and per-job dedup (spec §4.4); this
//! module only owns the poll cadence and worker concurrency bound, per
//! spec §9 "Coroutine/await control flow": "rewrite as explicit task
//! spawns bounded by semaphores".

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::app::AppState;

/// Maximum jobs concurrently in flight across all priority bands. The
/// per-kind bounds (8 summaries / 4 sheets) are enforced inside
/// `Workers::analyze_script`; this is the outer ceiling for the
/// dequeue-and-dispatch loop itself.
const MAX_CONCURRENT_JOBS: usize = 8;
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const RECLAIM_INTERVAL: Duration = Duration::from_secs(30);

/// Spawns the background worker loop as a detached task. Never exits
/// under normal operation — a panic inside a single job is caught by
/// `Workers::run_job`'s `Result` return, not by unwinding the loop.
pub fn spawn(state: Arc<AppState>) {
    tokio::spawn(reclaim_loop(state.clone()));
    tokio::spawn(drain_loop(state));
}

async fn drain_loop(state: Arc<AppState>) {
    let sem = Arc::new(Semaphore::new(MAX_CONCURRENT_JOBS));
    loop {
        let permit = match sem.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => return,
        };
        let task_state = state.clone();
        tokio::spawn(async move {
            let result = task_state.workers.drain_one(&task_state.queue).await;
            drop(permit);
            match result {
                Ok(true) | Ok(false) => {}
                Err(e) => error!(error = %e, "worker pool drain failed"),
            }
        });
        // The queue is empty roughly as often as it's full; a short poll
        // interval keeps urgent-priority jobs (post-edit summary
        // refresh) latency-bound without busy-spinning when idle.
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Periodically reclaims jobs whose lease expired without completion
/// (a worker crashed mid-job) back onto their queue for retry.
async fn reclaim_loop(state: Arc<AppState>) {
    loop {
        tokio::time::sleep(RECLAIM_INTERVAL).await;
        match state.queue.reclaim_expired() {
            Ok(0) => {}
            Ok(n) => warn!(count = n, "reclaimed expired jobs"),
            Err(e) => error!(error = %e, "reclaim_expired failed"),
        }
    }
}
