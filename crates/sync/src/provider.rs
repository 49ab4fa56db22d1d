//! The provider facade: membership queries with a freshness policy.

use crate::engine::SyncEngine;
use crate::error::{DrlError, SharedSyncOutcome};
use crate::progress::{ProgressNotifier, SubscriptionId};
use crate::single_flight::SingleFlight;
use drl_client::{DrlSource, HttpDrlClient};
use drl_core::{DownloadProgress, DrlOptions, HashedUcvi, SyncStatus};
use drl_store::{BlacklistStore, SqliteStore};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, PoisonError};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

type RefreshFuture = Shared<BoxFuture<'static, SharedSyncOutcome>>;

/// Offline revocation checks against the locally mirrored DRL.
///
/// `is_revoked` consults the local store and decides, from the configured
/// freshness windows, whether to trigger a refresh and whether to await it.
/// At most one refresh runs at a time; concurrent callers attach to it and
/// receive the same outcome.
pub struct DrlProvider {
    options: DrlOptions,
    store: Arc<dyn BlacklistStore>,
    engine: Arc<SyncEngine>,
    progress: Arc<ProgressNotifier>,
    runner: Arc<SingleFlight<SharedSyncOutcome>>,
    last_refresh_attempt: Mutex<Option<OffsetDateTime>>,
    /// Refresh tasks run under this token; `shutdown` cancels them.
    cancel: CancellationToken,
}

impl DrlProvider {
    /// Open the provider against the configured upstream service and the
    /// on-disk store under `options.base_path`.
    pub async fn open(options: DrlOptions) -> Result<Self, DrlError> {
        options.validate()?;
        let source = HttpDrlClient::new(&options.base_url)?;
        let store = SqliteStore::open_under(&options.base_path).await?;
        Ok(Self::with_parts(options, Arc::new(store), Arc::new(source)))
    }

    /// Assemble the provider from explicit collaborators.
    pub fn with_parts(
        options: DrlOptions,
        store: Arc<dyn BlacklistStore>,
        source: Arc<dyn DrlSource>,
    ) -> Self {
        let progress = Arc::new(ProgressNotifier::new());
        let engine = Arc::new(SyncEngine::new(source, store.clone(), progress.clone()));
        Self {
            options,
            store,
            engine,
            progress,
            runner: Arc::new(SingleFlight::new()),
            last_refresh_attempt: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Whether this provider serves revocations for a country.
    pub fn supports_country(&self, code: &str) -> bool {
        drl_core::supports_country(code)
    }

    /// Read the stored synchronization status without applying any policy.
    pub async fn status(&self) -> Result<SyncStatus, DrlError> {
        Ok(self.store.load_or_init_status().await?)
    }

    /// Register a download-progress callback.
    pub fn subscribe_progress(
        &self,
        callback: impl Fn(&DownloadProgress) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.progress.subscribe(callback)
    }

    /// Remove a download-progress callback.
    pub fn unsubscribe_progress(&self, id: SubscriptionId) -> bool {
        self.progress.unsubscribe(id)
    }

    /// Cancel any in-flight refresh and stop starting new ones.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Check whether a cleartext identifier is revoked.
    ///
    /// Applies the freshness policy first: beyond `max_file_age` the query
    /// blocks on a refresh and surfaces its error; beyond `refresh_interval`
    /// (or with a download pending) a refresh is triggered at most once per
    /// `min_refresh_interval`, and the query either awaits it or answers from
    /// the still-valid mirror per `use_available_values_while_refreshing`.
    pub async fn is_revoked(
        &self,
        ucvi: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, DrlError> {
        let status = self.store.load_or_init_status().await?;
        let now = OffsetDateTime::now_utc();

        if self.beyond_max_file_age(&status, now) {
            let refresh = self.trigger_refresh(now);
            self.await_refresh(refresh, cancel).await?;
        } else if self.beyond_refresh_interval(&status, now) || status.has_pending_download() {
            if self.attempt_allowed(now) {
                let refresh = self.trigger_refresh(now);
                if !self.options.use_available_values_while_refreshing {
                    match self.await_refresh(refresh, cancel).await {
                        Ok(_) => {}
                        Err(DrlError::Cancelled) => return Err(DrlError::Cancelled),
                        Err(error) => {
                            tracing::warn!(%error, "refresh failed, answering from the stale mirror");
                        }
                    }
                }
            }
        }

        let hashed = HashedUcvi::compute(ucvi).to_base64();
        Ok(self.store.contains_hashed_ucvi(&hashed).await?)
    }

    /// Trigger a refresh (or attach to the running one) and await its
    /// outcome, ignoring all freshness timers.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<SyncStatus, DrlError> {
        let refresh = self.trigger_refresh(OffsetDateTime::now_utc());
        self.await_refresh(refresh, cancel).await
    }

    fn beyond_max_file_age(&self, status: &SyncStatus, now: OffsetDateTime) -> bool {
        match status.last_check {
            Some(at) => now > at + self.options.max_file_age(),
            None => true,
        }
    }

    fn beyond_refresh_interval(&self, status: &SyncStatus, now: OffsetDateTime) -> bool {
        match status.last_check {
            Some(at) => now > at + self.options.refresh_interval(),
            None => true,
        }
    }

    fn attempt_allowed(&self, now: OffsetDateTime) -> bool {
        let last = self
            .last_refresh_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(at) => now > at + self.options.min_refresh_interval(),
            None => true,
        }
    }

    /// Start a refresh epoch or attach to the in-flight one. A new epoch gets
    /// a detached driver task so background refreshes progress even with no
    /// awaiting caller, and the slot is cleared on completion.
    fn trigger_refresh(&self, now: OffsetDateTime) -> RefreshFuture {
        *self
            .last_refresh_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(now);

        let engine = self.engine.clone();
        let cancel = self.cancel.clone();
        let (refresh, started) = self.runner.join_or_start(move || {
            async move {
                engine
                    .update_from_server(&cancel)
                    .await
                    .map_err(Arc::new)
            }
            .boxed()
        });
        if started {
            let runner = self.runner.clone();
            let driver = refresh.clone();
            tokio::spawn(async move {
                let _ = driver.await;
                runner.clear_finished();
            });
        }
        refresh
    }

    /// Wait for a refresh outcome without cancelling the refresh itself when
    /// the caller gives up.
    async fn await_refresh(
        &self,
        refresh: RefreshFuture,
        cancel: &CancellationToken,
    ) -> Result<SyncStatus, DrlError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(DrlError::Cancelled),
            outcome = refresh => outcome.map_err(DrlError::Refresh),
        }
    }
}
