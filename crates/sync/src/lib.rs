//! Incremental synchronization of the local DRL mirror.
//!
//! The sync engine reconciles the locally stored version with the server's
//! latest version through chunked downloads, recovers from inconsistencies by
//! wiping and retrying within a bounded budget, and coordinates a single
//! in-flight refresh against many concurrent membership queries.

pub mod engine;
pub mod error;
pub mod progress;
pub mod provider;
pub mod single_flight;

pub use engine::{MAX_CONSISTENCY_RETRIES, SyncEngine};
pub use error::{DrlError, SharedSyncOutcome, SyncError, SyncResult};
pub use progress::{ProgressNotifier, SubscriptionId};
pub use provider::DrlProvider;
pub use single_flight::SingleFlight;
