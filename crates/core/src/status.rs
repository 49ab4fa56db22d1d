//! The synchronization status record.
//!
//! `SyncStatus` is the single persisted row describing which DRL version is
//! installed locally and which one is being downloaded. It is mutated only by
//! the sync engine; membership queries read it to decide freshness.

use crate::drl::VersionInfo;
use time::OffsetDateTime;

/// Singleton record tracking the locally installed and in-flight DRL versions.
///
/// `current_*` fields describe the last fully installed version (`0` = none).
/// `target_*` fields describe the version being downloaded; `last_chunk_saved`
/// is the highest chunk index already persisted (`0` = none, chunks are
/// 1-based).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncStatus {
    pub current_version: i64,
    pub current_version_id: String,
    pub target_version: i64,
    pub target_version_id: String,
    pub target_chunks_count: i64,
    pub target_chunk_size: i64,
    pub target_total_number_ucvi: i64,
    pub last_chunk_saved: i64,
    /// Timestamp of the most recent successful consistency confirmation.
    /// `None` means the mirror has never been confirmed.
    pub last_check: Option<OffsetDateTime>,
}

impl SyncStatus {
    /// A fully installed version exists locally.
    pub fn has_current_version(&self) -> bool {
        self.current_version > 0
    }

    /// The installed version is the same payload as the download target.
    pub fn current_version_matches_target(&self) -> bool {
        self.current_version == self.target_version
            && self.current_version_id == self.target_version_id
    }

    /// At least one chunk of the target has been persisted.
    pub fn any_chunk_downloaded(&self) -> bool {
        self.last_chunk_saved > 0
    }

    /// A target is set and not all of its chunks have been persisted yet.
    pub fn has_pending_download(&self) -> bool {
        self.target_chunks_count > 0 && self.last_chunk_saved < self.target_chunks_count
    }

    /// The installed version is exactly the one the server describes.
    pub fn is_same_version(&self, info: &VersionInfo) -> bool {
        self.current_version == info.version && self.current_version_id == info.id
    }

    /// The download target is the version the server describes.
    pub fn is_target_version(&self, info: &VersionInfo) -> bool {
        self.target_version == info.version && self.target_version_id == info.id
    }

    /// The download target matches the server descriptor including its chunk
    /// count, so a partial download may be resumed against it.
    pub fn is_target_version_consistent(&self, info: &VersionInfo) -> bool {
        self.is_target_version(info) && self.target_chunks_count == info.total_chunks
    }

    /// Point the target fields at a new server descriptor and restart the
    /// chunk sequence from the beginning.
    pub fn adopt_target(&mut self, info: &VersionInfo) {
        self.target_version = info.version;
        self.target_version_id = info.id.clone();
        self.target_chunks_count = info.total_chunks;
        self.target_chunk_size = info.single_chunk_size;
        self.target_total_number_ucvi = info.total_number_ucvi;
        self.last_chunk_saved = 0;
    }

    /// Zero every current/target field. Used when the database must be wiped;
    /// `last_check` is left untouched.
    pub fn reset_versions(&mut self) {
        self.current_version = 0;
        self.current_version_id.clear();
        self.target_version = 0;
        self.target_version_id.clear();
        self.target_chunks_count = 0;
        self.target_chunk_size = 0;
        self.target_total_number_ucvi = 0;
        self.last_chunk_saved = 0;
    }

    /// Promote the target version to the installed version after a successful
    /// finalize.
    pub fn promote_target(&mut self, now: OffsetDateTime) {
        self.current_version = self.target_version;
        self.current_version_id = self.target_version_id.clone();
        self.last_check = Some(now);
    }
}
