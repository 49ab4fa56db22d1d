//! Sync and provider error types.

use drl_client::ClientError;
use drl_core::SyncStatus;
use drl_store::StoreError;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a refresh run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote client error: {0}")]
    Client(#[from] ClientError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("local mirror still inconsistent after {attempts} wipe-and-retry attempts")]
    Inconsistent { attempts: u32 },

    #[error("refresh cancelled")]
    Cancelled,
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Outcome delivered identically to every caller attached to one refresh run.
pub type SharedSyncOutcome = std::result::Result<SyncStatus, Arc<SyncError>>;

/// Errors surfaced by the provider facade.
#[derive(Debug, Error)]
pub enum DrlError {
    #[error("configuration error: {0}")]
    Config(#[from] drl_core::Error),

    #[error("client error: {0}")]
    Client(#[from] ClientError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("refresh failed: {0}")]
    Refresh(#[from] Arc<SyncError>),

    #[error("operation cancelled")]
    Cancelled,
}
