//! Provider configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Configuration for the DRL mirror provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DrlOptions {
    /// Base URL of the upstream DRL service.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Directory under which the local store file lives.
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
    /// Normal staleness window; after expiry a refresh is triggered.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Floor between refresh attempts, regardless of staleness.
    #[serde(default = "default_min_refresh_interval_secs")]
    pub min_refresh_interval_secs: u64,
    /// Hard staleness bound; after expiry queries block on refresh.
    #[serde(default = "default_max_file_age_secs")]
    pub max_file_age_secs: u64,
    /// When the soft window expired but the hard bound has not: answer from
    /// the stale mirror while the refresh runs in the background instead of
    /// awaiting it.
    #[serde(default = "default_use_available_values")]
    pub use_available_values_while_refreshing: bool,
}

fn default_base_url() -> String {
    "https://get.dgc.gov.it/v1/dgc/drl".to_string()
}

fn default_base_path() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("./data"))
}

fn default_refresh_interval_secs() -> u64 {
    86_400 // 24 hours
}

fn default_min_refresh_interval_secs() -> u64 {
    300 // 5 minutes
}

fn default_max_file_age_secs() -> u64 {
    1_296_000 // 15 days
}

fn default_use_available_values() -> bool {
    true
}

impl Default for DrlOptions {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            base_path: default_base_path(),
            refresh_interval_secs: default_refresh_interval_secs(),
            min_refresh_interval_secs: default_min_refresh_interval_secs(),
            max_file_age_secs: default_max_file_age_secs(),
            use_available_values_while_refreshing: default_use_available_values(),
        }
    }
}

impl DrlOptions {
    /// Create a test configuration with tight intervals.
    ///
    /// **For testing only.** `base_path` still needs to be pointed at a
    /// temporary directory by the caller.
    pub fn for_testing() -> Self {
        Self {
            base_url: "http://127.0.0.1:0".to_string(),
            base_path: PathBuf::from("./data"),
            refresh_interval_secs: 1,
            min_refresh_interval_secs: 0,
            max_file_age_secs: 60,
            use_available_values_while_refreshing: true,
        }
    }

    /// Get the normal staleness window as a Duration.
    pub fn refresh_interval(&self) -> Duration {
        Duration::seconds(i64::try_from(self.refresh_interval_secs).unwrap_or(i64::MAX))
    }

    /// Get the refresh-attempt floor as a Duration.
    pub fn min_refresh_interval(&self) -> Duration {
        Duration::seconds(i64::try_from(self.min_refresh_interval_secs).unwrap_or(i64::MAX))
    }

    /// Get the hard staleness bound as a Duration.
    pub fn max_file_age(&self) -> Duration {
        Duration::seconds(i64::try_from(self.max_file_age_secs).unwrap_or(i64::MAX))
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> crate::Result<()> {
        if self.base_url.is_empty() {
            return Err(crate::Error::InvalidConfig(
                "base_url must not be empty".to_string(),
            ));
        }
        if self.min_refresh_interval_secs > self.refresh_interval_secs {
            return Err(crate::Error::InvalidConfig(format!(
                "min_refresh_interval_secs {} exceeds refresh_interval_secs {}",
                self.min_refresh_interval_secs, self.refresh_interval_secs
            )));
        }
        if self.refresh_interval_secs > self.max_file_age_secs {
            return Err(crate::Error::InvalidConfig(format!(
                "refresh_interval_secs {} exceeds max_file_age_secs {}",
                self.refresh_interval_secs, self.max_file_age_secs
            )));
        }
        Ok(())
    }
}
