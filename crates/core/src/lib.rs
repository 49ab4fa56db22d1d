//! Core domain types for the DRL mirror.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Hashed certificate identifiers (the only form ever persisted)
//! - The `SyncStatus` record and its derived predicates
//! - The upstream wire model (`VersionInfo`, `ChunkData`, deltas)
//! - Download progress events
//! - Provider configuration

pub mod config;
pub mod drl;
pub mod error;
pub mod hash;
pub mod status;

pub use config::DrlOptions;
pub use drl::{ChunkData, DownloadProgress, DrlDelta, VersionInfo};
pub use error::{Error, Result};
pub use hash::HashedUcvi;
pub use status::SyncStatus;

/// ISO country code of the single issuer this mirror supports.
pub const SUPPORTED_COUNTRY: &str = "IT";

/// Returns whether a country code is served by this mirror.
pub fn supports_country(code: &str) -> bool {
    code.eq_ignore_ascii_case(SUPPORTED_COUNTRY)
}
