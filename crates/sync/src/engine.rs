//! The incremental synchronization state machine.
//!
//! [`SyncEngine::update_from_server`] reconciles the locally stored DRL
//! version with the server's latest one through chunked downloads. A chunk
//! download can be interrupted at any point and resumes from the last
//! persisted chunk; the server's target version may change mid-download; on
//! any detected inconsistency the local mirror is wiped and rebuilt, within a
//! bounded retry budget.

use crate::error::{SyncError, SyncResult};
use crate::progress::ProgressNotifier;
use drl_client::DrlSource;
use drl_core::{ChunkData, DownloadProgress, SyncStatus};
use drl_store::{BlacklistStore, ChunkApply};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

/// Wipe-and-retry budget for detected inconsistencies.
pub const MAX_CONSISTENCY_RETRIES: u32 = 3;

/// Outcome of one reconciliation pass.
enum Pass {
    /// Converged on a status: installed, or left valid for the next refresh.
    Done(SyncStatus),
    /// The mirror was wiped; reconcile again from scratch.
    Wiped,
}

/// What a downloaded chunk asks the store to do.
struct ChunkBody<'a> {
    wipe_first: bool,
    snapshot: bool,
    insertions: &'a [String],
    deletions: &'a [String],
}

impl<'a> ChunkBody<'a> {
    fn of(chunk: &'a ChunkData) -> Self {
        match (&chunk.revoked_ucvi_list, &chunk.delta) {
            (Some(list), _) => Self {
                wipe_first: chunk.is_snapshot_start(),
                snapshot: true,
                insertions: list.as_slice(),
                deletions: &[],
            },
            (None, Some(delta)) => Self {
                wipe_first: false,
                snapshot: false,
                insertions: delta.insertions.as_slice(),
                deletions: delta.deletions.as_slice(),
            },
            (None, None) => Self {
                wipe_first: false,
                snapshot: false,
                insertions: &[],
                deletions: &[],
            },
        }
    }
}

/// The state machine reconciling the local mirror with the upstream DRL.
pub struct SyncEngine {
    source: Arc<dyn DrlSource>,
    store: Arc<dyn BlacklistStore>,
    progress: Arc<ProgressNotifier>,
}

impl SyncEngine {
    /// Assemble an engine from its collaborators.
    pub fn new(
        source: Arc<dyn DrlSource>,
        store: Arc<dyn BlacklistStore>,
        progress: Arc<ProgressNotifier>,
    ) -> Self {
        Self {
            source,
            store,
            progress,
        }
    }

    /// Reconcile the local mirror with the server's latest version.
    ///
    /// Runs reconciliation passes until one converges. A pass that detects an
    /// inconsistent mirror wipes it and consumes one unit of the retry
    /// budget; when the budget is exhausted the error is
    /// [`SyncError::Inconsistent`].
    pub async fn update_from_server(&self, cancel: &CancellationToken) -> SyncResult<SyncStatus> {
        for attempt in 1..=MAX_CONSISTENCY_RETRIES {
            match self.sync_once(cancel).await? {
                Pass::Done(status) => return Ok(status),
                Pass::Wiped => {
                    tracing::warn!(attempt, "local mirror wiped, reconciling from scratch");
                }
            }
        }
        Err(SyncError::Inconsistent {
            attempts: MAX_CONSISTENCY_RETRIES,
        })
    }

    /// One reconciliation pass against the server.
    async fn sync_once(&self, cancel: &CancellationToken) -> SyncResult<Pass> {
        let mut status = self.store.load_or_init_status().await?;
        let remote = self.source.get_status(status.current_version).await?;
        tracing::debug!(
            local_version = status.current_version,
            remote_version = remote.version,
            "fetched DRL status"
        );

        // Fast path: already on the server's version. Confirm the entry count
        // and refresh the check timestamp without downloading anything.
        if status.is_same_version(&remote) {
            let count = self.store.count_entries().await?;
            if count == remote.total_number_ucvi {
                status.last_check = Some(OffsetDateTime::now_utc());
                self.store.update_status(&status).await?;
                return Ok(Pass::Done(status));
            }
            tracing::warn!(
                version = status.current_version,
                expected = remote.total_number_ucvi,
                actual = count,
                "entry count does not match the installed version, wiping"
            );
            self.wipe(&mut status).await?;
            return Ok(Pass::Wiped);
        }

        // Upgrade path: reconcile the target metadata. A matching target
        // means a prior download can resume from last_chunk_saved; a stale
        // target with chunks already applied cannot be salvaged.
        if !status.is_target_version_consistent(&remote) {
            if status.has_pending_download() && status.any_chunk_downloaded() {
                tracing::warn!(
                    target_version = status.target_version,
                    remote_version = remote.version,
                    last_chunk_saved = status.last_chunk_saved,
                    "pending download no longer matches the remote target, wiping"
                );
                self.wipe(&mut status).await?;
                return Ok(Pass::Wiped);
            }
            status.adopt_target(&remote);
            self.store.update_status(&status).await?;
            tracing::info!(
                target_version = status.target_version,
                total_chunks = status.target_chunks_count,
                total_ucvi = status.target_total_number_ucvi,
                "downloading new DRL version"
            );
        } else if status.any_chunk_downloaded() {
            tracing::info!(
                target_version = status.target_version,
                last_chunk_saved = status.last_chunk_saved,
                total_chunks = status.target_chunks_count,
                "resuming interrupted DRL download"
            );
        }

        self.progress
            .emit(&DownloadProgress::from_status(&status, false));

        while status.has_pending_download() {
            if cancel.is_cancelled() {
                tracing::info!(
                    last_chunk_saved = status.last_chunk_saved,
                    "refresh cancelled at chunk boundary"
                );
                return Err(SyncError::Cancelled);
            }

            let chunk = self
                .source
                .get_chunk(status.current_version, status.last_chunk_saved + 1)
                .await?;

            // The server may have moved to a newer version mid-download. Adopt
            // its metadata; the first chunk of the new version can be applied
            // directly, anything else restarts the chunk sequence.
            if !status.is_target_version_consistent(&chunk.version_info()) {
                let first_of_new = chunk.chunk == 1 && !status.any_chunk_downloaded();
                tracing::info!(
                    old_target = status.target_version,
                    new_target = chunk.version,
                    chunk = chunk.chunk,
                    "target version changed mid-download"
                );
                status.adopt_target(&chunk.version_info());
                self.store.update_status(&status).await?;
                self.progress
                    .emit(&DownloadProgress::from_status(&status, false));
                if !first_of_new {
                    continue;
                }
            }

            if chunk.chunk != status.last_chunk_saved + 1 {
                tracing::warn!(
                    expected = status.last_chunk_saved + 1,
                    received = chunk.chunk,
                    "chunk arrived out of order, wiping"
                );
                self.wipe(&mut status).await?;
                return Ok(Pass::Wiped);
            }

            let body = ChunkBody::of(&chunk);
            status.target_total_number_ucvi = chunk.total_number_ucvi;
            status.last_chunk_saved = chunk.chunk;
            let stats = self
                .store
                .apply_chunk(
                    ChunkApply {
                        wipe_first: body.wipe_first,
                        insertions: body.insertions,
                        deletions: body.deletions,
                    },
                    &status,
                )
                .await?;
            if body.snapshot && (stats.inserted as usize) < body.insertions.len() {
                tracing::warn!(
                    chunk = chunk.chunk,
                    received = body.insertions.len(),
                    inserted = stats.inserted,
                    "snapshot chunk overlaps entries already present"
                );
            }
            tracing::debug!(
                chunk = chunk.chunk,
                of = status.target_chunks_count,
                inserted = stats.inserted,
                deleted = stats.deleted,
                "chunk persisted"
            );

            if !status.has_pending_download() {
                if self.finalize(&mut status).await? {
                    self.progress
                        .emit(&DownloadProgress::from_status(&status, true));
                    return Ok(Pass::Done(status));
                }
                return Ok(Pass::Wiped);
            }

            self.progress
                .emit(&DownloadProgress::from_status(&status, false));
        }

        // Resume path: all chunks were already persisted by an earlier run
        // but the target was never promoted. Re-check that the server still
        // publishes this target before finalizing; if it moved on, leave the
        // state as is for the next refresh to reconcile.
        if !status.current_version_matches_target() {
            let remote = self.source.get_status(status.current_version).await?;
            if status.is_target_version(&remote) {
                if self.finalize(&mut status).await? {
                    self.progress
                        .emit(&DownloadProgress::from_status(&status, true));
                    return Ok(Pass::Done(status));
                }
                return Ok(Pass::Wiped);
            }
            tracing::info!(
                target_version = status.target_version,
                remote_version = remote.version,
                "server moved past the downloaded target, deferring to next refresh"
            );
        }
        Ok(Pass::Done(status))
    }

    /// Promote the fully downloaded target to the installed version.
    ///
    /// The persisted entry count must equal the declared total; otherwise the
    /// mirror is wiped and `false` is returned so the caller retries.
    async fn finalize(&self, status: &mut SyncStatus) -> SyncResult<bool> {
        let count = self.store.count_entries().await?;
        if count == status.target_total_number_ucvi {
            status.promote_target(OffsetDateTime::now_utc());
            self.store.update_status(status).await?;
            tracing::info!(
                version = status.current_version,
                entries = count,
                "DRL version installed"
            );
            return Ok(true);
        }
        tracing::warn!(
            version = status.target_version,
            expected = status.target_total_number_ucvi,
            actual = count,
            "entry count mismatch after download, wiping"
        );
        self.wipe(status).await?;
        Ok(false)
    }

    /// Wipe all entries and zero every version field in one transaction.
    async fn wipe(&self, status: &mut SyncStatus) -> SyncResult<()> {
        status.reset_versions();
        self.store.reset(status).await?;
        Ok(())
    }
}
