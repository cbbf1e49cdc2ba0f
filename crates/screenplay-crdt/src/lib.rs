pub mod db;
pub mod document;
pub mod error;
pub mod store;
pub mod types;

pub use document::{CrdtDocument, JsonSnapshotDocument};
pub use error::{CrdtError, Result};
pub use store::{CrdtStore, DEFAULT_COMPACTION_THRESHOLD};
pub use types::{CrdtUpdateRow, ParentKind, SnapshotMetadata};
