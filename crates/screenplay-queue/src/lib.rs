//! Priority job queue backing the refresh workers (spec §4.4).
//!
//! # Overview
//!
//! Jobs are persisted to a SQLite `jobs` table across three priority
//! lanes (urgent / normal / low), FIFO within a lane. [`engine::JobQueue`]
//! owns enqueue/dequeue, per-job timeouts, retry-then-dead-letter, and
//! dead-letter requeue.

pub mod db;
pub mod engine;
pub mod error;
pub mod types;

pub use engine::JobQueue;
pub use error::{QueueError, Result};
pub use types::{priority_rank, Job, JobKind, JobPriority, JobStatus};
