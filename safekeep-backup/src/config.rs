use crate::error::{BackupError, BackupResult};
use safekeep_storage::DEFAULT_MAX_RETAINED;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for periodic backups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Seconds between scheduled cycles.
    pub interval_secs: u64,
    /// Local snapshots kept after each cycle.
    pub max_retained: usize,
    /// On a full medium, evict the oldest snapshot and retry once.
    pub evict_on_full: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            max_retained: DEFAULT_MAX_RETAINED,
            evict_on_full: true,
        }
    }
}

impl BackupConfig {
    pub fn validate(&self) -> BackupResult<()> {
        if self.interval_secs == 0 {
            return Err(BackupError::Config("interval_secs must be positive".to_string()));
        }
        if self.max_retained == 0 {
            return Err(BackupError::Config("max_retained must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
