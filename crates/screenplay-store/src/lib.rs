pub mod cas;
pub mod db;
pub mod error;
pub mod metrics;
pub mod repository;
pub mod staleness;
pub mod state_machine;
pub mod types;

pub use error::{Result, StoreError};
pub use repository::ScriptRepository;
