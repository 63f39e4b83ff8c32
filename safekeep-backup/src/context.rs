//! A backup cycle and the operations that share its in-flight guard.
//!
//! Only one of {scheduled cycle, manual backup, restore} runs at a time. A
//! cycle that finds another one in flight is skipped; a restore that does is
//! refused with [`BackupError::Busy`].

use crate::config::BackupConfig;
use crate::error::{BackupError, BackupResult};
use crate::provider::StateProvider;
use chrono::{DateTime, Utc};
use safekeep_cloud::{CloudError, CredentialManager, SyncCoordinator, VersionToken};
use safekeep_storage::{KvStore, Snapshot, SnapshotInfo, SnapshotStore};
use safekeep_types::{Clock, SnapshotId, StateBlob};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// What happened to the remote mirror during a cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoteOutcome {
    /// Remote sync is not configured or not enabled.
    Disabled,
    /// The credential was refused earlier; waiting for a new one.
    SkippedRejected,
    Pushed { version: VersionToken, attempts: u32 },
    /// The push failed. The local snapshot is unaffected.
    Failed { error: String, retryable: bool },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub snapshot: SnapshotInfo,
    pub remote: RemoteOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The application had no state to back up.
    SkippedEmpty,
    /// Another cycle or restore was already running.
    SkippedInFlight,
    Completed(CycleReport),
}

/// Point-in-time view of the backup system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BackupStatus {
    pub is_running: bool,
    pub total_backups: usize,
    pub last_backup: Option<DateTime<Utc>>,
    pub remote_sync_enabled: bool,
    pub credential_rejected: bool,
    pub last_cycle: Option<CycleOutcome>,
    pub last_error: Option<String>,
}

struct RemoteSync {
    coordinator: SyncCoordinator,
    credentials: Arc<CredentialManager>,
}

#[derive(Default)]
struct LastCycle {
    outcome: Option<CycleOutcome>,
    error: Option<String>,
}

/// Clears the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs backup cycles and restores against one snapshot store.
pub struct BackupContext {
    config: BackupConfig,
    snapshots: SnapshotStore,
    provider: Arc<dyn StateProvider>,
    remote: Option<RemoteSync>,
    in_flight: AtomicBool,
    scheduled: AtomicBool,
    last_cycle: Mutex<LastCycle>,
}

impl BackupContext {
    pub fn new(
        config: BackupConfig,
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn StateProvider>,
    ) -> BackupResult<Self> {
        config.validate()?;
        let snapshots = SnapshotStore::new(kv, clock, config.max_retained)?;
        Ok(Self {
            config,
            snapshots,
            provider,
            remote: None,
            in_flight: AtomicBool::new(false),
            scheduled: AtomicBool::new(false),
            last_cycle: Mutex::new(LastCycle::default()),
        })
    }

    /// Mirrors each new snapshot through `coordinator` while `credentials`
    /// has sync enabled.
    pub fn with_remote(
        mut self,
        coordinator: SyncCoordinator,
        credentials: Arc<CredentialManager>,
    ) -> Self {
        self.remote = Some(RemoteSync {
            coordinator,
            credentials,
        });
        self
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Held snapshots, newest first.
    pub fn list_backups(&self) -> BackupResult<Vec<SnapshotInfo>> {
        Ok(self.snapshots.list()?)
    }

    /// Runs one backup cycle unless one is already in flight.
    ///
    /// Fails only when the state cannot be read or the local snapshot cannot
    /// be written. Remote failures are reported in the outcome.
    pub async fn run_cycle(&self) -> BackupResult<CycleOutcome> {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            debug!("backup cycle already in flight, skipping");
            return Ok(CycleOutcome::SkippedInFlight);
        };

        let result = self.cycle().await;
        let mut last = self.last_cycle();
        match &result {
            Ok(outcome) => {
                last.outcome = Some(outcome.clone());
                last.error = None;
            }
            Err(e) => {
                error!("backup cycle failed: {e}");
                last.error = Some(e.to_string());
            }
        }
        result
    }

    /// Manual trigger. Shares the guard with scheduled cycles.
    pub async fn backup_now(&self) -> BackupResult<CycleOutcome> {
        info!("manual backup requested");
        self.run_cycle().await
    }

    /// Applies the snapshot `id` to the application.
    pub async fn restore_backup(&self, id: &SnapshotId) -> BackupResult<()> {
        let _guard = InFlight::acquire(&self.in_flight).ok_or(BackupError::Busy)?;

        let state = self
            .snapshots
            .restore(id)?
            .ok_or_else(|| BackupError::SnapshotNotFound(id.clone()))?;
        self.provider
            .apply_state(&state)
            .map_err(BackupError::Provider)?;

        info!("restored snapshot {id} ({} sections)", state.len());
        Ok(())
    }

    /// Applies the remote object's payload to the application.
    pub async fn restore_from_remote(&self) -> BackupResult<()> {
        let _guard = InFlight::acquire(&self.in_flight).ok_or(BackupError::Busy)?;
        let remote = self.remote.as_ref().ok_or(CloudError::SyncDisabled)?;

        let state = remote
            .coordinator
            .pull()
            .await?
            .ok_or(BackupError::RemoteNotFound)?;
        self.provider
            .apply_state(&state)
            .map_err(BackupError::Provider)?;

        info!("restored remote object ({} sections)", state.len());
        Ok(())
    }

    pub async fn status(&self) -> BackupResult<BackupStatus> {
        let held = self.snapshots.list()?;
        let (remote_sync_enabled, credential_rejected) = match &self.remote {
            Some(remote) => (
                remote.credentials.is_enabled().await,
                remote.credentials.is_rejected(),
            ),
            None => (false, false),
        };
        let last = self.last_cycle();

        Ok(BackupStatus {
            is_running: self.scheduled.load(Ordering::Acquire),
            total_backups: held.len(),
            last_backup: held.first().map(|s| s.created_at),
            remote_sync_enabled,
            credential_rejected,
            last_cycle: last.outcome.clone(),
            last_error: last.error.clone(),
        })
    }

    pub(crate) fn set_scheduled(&self, scheduled: bool) {
        self.scheduled.store(scheduled, Ordering::Release);
    }

    async fn cycle(&self) -> BackupResult<CycleOutcome> {
        let state = self
            .provider
            .read_current_state()
            .map_err(BackupError::Provider)?;
        if state.is_empty() {
            info!("no application state to back up");
            return Ok(CycleOutcome::SkippedEmpty);
        }

        let snapshot = self.create_snapshot(&state)?;
        let remote = self.push_remote(&state).await;

        Ok(CycleOutcome::Completed(CycleReport {
            snapshot: SnapshotInfo {
                id: snapshot.id,
                created_at: snapshot.created_at,
            },
            remote,
        }))
    }

    fn create_snapshot(&self, state: &StateBlob) -> BackupResult<Snapshot> {
        match self.snapshots.create(state) {
            Err(e) if e.is_storage_full() && self.config.evict_on_full => {
                warn!("{e}; evicting the oldest snapshot and retrying");
                let purged = self.snapshots.purge_corrupt()?;
                let evicted = self.snapshots.evict_oldest()?;
                if purged == 0 && evicted.is_none() {
                    return Err(e.into());
                }
                Ok(self.snapshots.create(state)?)
            }
            result => Ok(result?),
        }
    }

    async fn push_remote(&self, state: &StateBlob) -> RemoteOutcome {
        let Some(remote) = &self.remote else {
            return RemoteOutcome::Disabled;
        };
        if !remote.credentials.is_enabled().await {
            return RemoteOutcome::Disabled;
        }
        if remote.credentials.is_rejected() {
            debug!("skipping push until a new credential is set");
            return RemoteOutcome::SkippedRejected;
        }

        match remote.coordinator.push(state).await {
            Ok(report) => RemoteOutcome::Pushed {
                version: report.version,
                attempts: report.attempts,
            },
            Err(CloudError::SyncDisabled) => RemoteOutcome::Disabled,
            Err(e) => {
                warn!("remote push failed, local snapshot kept: {e}");
                RemoteOutcome::Failed {
                    retryable: e.is_retryable(),
                    error: e.to_string(),
                }
            }
        }
    }

    fn last_cycle(&self) -> MutexGuard<'_, LastCycle> {
        self.last_cycle.lock().unwrap_or_else(|e| e.into_inner())
    }
}
