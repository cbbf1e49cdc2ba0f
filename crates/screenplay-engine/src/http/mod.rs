//! Minimal illustrative HTTP surface binding the core's entrypoints
//! (spec §6) onto axum routes. Routing/auth as a product surface is
//! explicitly out of scope (spec §1 Non-goals) — this module exists only
//! so the entrypoints are reachable for manual exercise, not as a
//! finished API gateway.

pub mod analyze;
pub mod chat;
pub mod crdt;
pub mod health;
pub mod scenes;
