//! Local blacklist store for the DRL mirror.
//!
//! A single-file SQLite database holding two collections: the singleton
//! `sync_status` row and the set of hashed revoked identifiers. Every trait
//! operation is one transaction; concurrent readers observe either the pre-
//! or post-state of a write.

pub mod error;
pub mod models;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{BlacklistStore, ChunkApply, ChunkApplyStats, PAGE, STORE_RELATIVE_PATH, SqliteStore};
