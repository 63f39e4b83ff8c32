//! Rotating snapshot store.
//!
//! Every snapshot is written once under `backup_<id>` and never modified.
//! After each write the store keeps only the `max_retained` newest snapshots,
//! ordered by creation time (later insertion wins a tie), and deletes the rest.
//!
//! Stored layout, one JSON object per snapshot:
//!
//! ```text
//! { <sections...>, "backupTime": "2025-03-01T08:30:00.000Z", "backupId": "...", "version": "1.0" }
//! ```
//!
//! Entries that fail to parse are treated as absent: listing skips them,
//! restore reports them as not found, eviction leaves them alone.

use crate::error::{StorageError, StorageResult};
use crate::kv::KvStore;
use chrono::{DateTime, SubsecRound, Utc};
use safekeep_types::{iso8601, Clock, SnapshotId, StateBlob, FORMAT_VERSION, RESERVED_KEYS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key prefix for snapshot entries.
pub const SNAPSHOT_KEY_PREFIX: &str = "backup_";

/// Snapshots kept when no other limit is configured.
pub const DEFAULT_MAX_RETAINED: usize = 10;

/// An immutable, timestamped copy of application state.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub created_at: DateTime<Utc>,
    pub payload: StateBlob,
}

/// Listing entry for a held snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub id: SnapshotId,
    #[serde(with = "safekeep_types::iso8601")]
    pub created_at: DateTime<Utc>,
}

/// Full view of the snapshot namespace, including unreadable entries.
#[derive(Clone, Debug, Default)]
pub struct SnapshotScan {
    /// Readable snapshots, newest first.
    pub snapshots: Vec<SnapshotInfo>,
    /// Keys under the snapshot prefix whose values could not be parsed.
    pub corrupt_keys: Vec<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRecord {
    #[serde(flatten)]
    sections: BTreeMap<String, Value>,
    #[serde(with = "safekeep_types::iso8601")]
    backup_time: DateTime<Utc>,
    backup_id: SnapshotId,
    version: String,
}

/// Persists snapshots in a [`KvStore`] and enforces the retention limit.
pub struct SnapshotStore {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    max_retained: usize,
}

impl SnapshotStore {
    pub fn new(
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        max_retained: usize,
    ) -> StorageResult<Self> {
        if max_retained == 0 {
            return Err(StorageError::Config(
                "max_retained must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            kv,
            clock,
            max_retained,
        })
    }

    pub fn max_retained(&self) -> usize {
        self.max_retained
    }

    /// Stores `state` as a new snapshot, then evicts everything beyond the
    /// `max_retained` newest.
    ///
    /// A write rejected by the medium surfaces as
    /// [`StorageError::StorageFull`]; nothing is evicted in that case.
    pub fn create(&self, state: &StateBlob) -> StorageResult<Snapshot> {
        if let Some(section) = state.reserved_section() {
            return Err(StorageError::ReservedSection(section.to_string()));
        }

        let created_at = self.clock.now().trunc_subsecs(3);
        let id = SnapshotId::generate(created_at);

        let record = SnapshotRecord {
            sections: state.clone().into_sections(),
            backup_time: created_at,
            backup_id: id.clone(),
            version: FORMAT_VERSION.to_string(),
        };
        let encoded = serde_json::to_string(&record)?;

        self.kv.put(&snapshot_key(&id), &encoded)?;
        info!("snapshot {id} created ({} sections)", state.len());

        self.enforce_retention()?;

        Ok(Snapshot {
            id,
            created_at,
            payload: state.clone(),
        })
    }

    /// Held snapshots, newest first. Corrupt entries are skipped.
    pub fn list(&self) -> StorageResult<Vec<SnapshotInfo>> {
        let scan = self.scan()?;
        for key in &scan.corrupt_keys {
            warn!("skipping unreadable snapshot entry {key}");
        }
        Ok(scan.snapshots)
    }

    /// Like [`list`](Self::list) but also reports the keys that failed to parse.
    pub fn scan(&self) -> StorageResult<SnapshotScan> {
        let keys = self.kv.keys_with_prefix(SNAPSHOT_KEY_PREFIX)?;
        let mut scan = SnapshotScan::default();

        // Newest insertion first, so the stable sort below breaks ties in its favour.
        for key in keys.into_iter().rev() {
            match self.read_record(&key)? {
                Some(Ok(record)) => scan.snapshots.push(SnapshotInfo {
                    id: record.backup_id,
                    created_at: record.backup_time,
                }),
                Some(Err(_)) => scan.corrupt_keys.push(key),
                // Removed between the key scan and the read.
                None => {}
            }
        }

        scan.snapshots
            .sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(scan)
    }

    /// Looks up a snapshot by id. Evicted, unknown and corrupt ids yield `None`.
    pub fn get(&self, id: &SnapshotId) -> StorageResult<Option<Snapshot>> {
        match self.read_record(&snapshot_key(id))? {
            Some(Ok(record)) => Ok(Some(Snapshot {
                id: record.backup_id,
                created_at: record.backup_time,
                payload: StateBlob::from_sections(record.sections),
            })),
            Some(Err(e)) => {
                warn!("snapshot {id} is unreadable, treating as absent: {e}");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Returns the payload stored for `id`, for the caller to apply.
    pub fn restore(&self, id: &SnapshotId) -> StorageResult<Option<StateBlob>> {
        Ok(self.get(id)?.map(|snapshot| snapshot.payload))
    }

    /// The newest held snapshot, if any.
    pub fn latest(&self) -> StorageResult<Option<SnapshotInfo>> {
        Ok(self.list()?.into_iter().next())
    }

    /// Number of readable snapshots held.
    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.scan()?.snapshots.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Deletes the single oldest snapshot, returning its id.
    pub fn evict_oldest(&self) -> StorageResult<Option<SnapshotId>> {
        let Some(oldest) = self.scan()?.snapshots.pop() else {
            return Ok(None);
        };
        self.kv.remove(&snapshot_key(&oldest.id))?;
        info!("evicted oldest snapshot {}", oldest.id);
        Ok(Some(oldest.id))
    }

    /// Deletes every unreadable entry under the snapshot prefix.
    pub fn purge_corrupt(&self) -> StorageResult<usize> {
        let corrupt = self.scan()?.corrupt_keys;
        for key in &corrupt {
            self.kv.remove(key)?;
            warn!("purged unreadable snapshot entry {key}");
        }
        Ok(corrupt.len())
    }

    fn enforce_retention(&self) -> StorageResult<()> {
        let snapshots = self.scan()?.snapshots;
        if snapshots.len() <= self.max_retained {
            return Ok(());
        }

        for stale in &snapshots[self.max_retained..] {
            self.kv.remove(&snapshot_key(&stale.id))?;
            debug!("evicted snapshot {} from {}", stale.id, iso8601::format(&stale.created_at));
        }
        Ok(())
    }

    /// Reads and decodes the entry at `key`.
    ///
    /// Outer `None`: no such key. Inner `Err`: the value is not a snapshot.
    fn read_record(&self, key: &str) -> StorageResult<Option<Result<SnapshotRecord, StorageError>>> {
        let Some(raw) = self.kv.get(key)? else {
            return Ok(None);
        };
        Ok(Some(decode_record(key, &raw)))
    }
}

fn snapshot_key(id: &SnapshotId) -> String {
    format!("{SNAPSHOT_KEY_PREFIX}{id}")
}

fn decode_record(key: &str, raw: &str) -> Result<SnapshotRecord, StorageError> {
    let corrupt = |reason: String| StorageError::Corrupt {
        key: key.to_string(),
        reason,
    };

    let mut record: SnapshotRecord =
        serde_json::from_str(raw).map_err(|e| corrupt(e.to_string()))?;

    if !record.version.starts_with("1.") {
        return Err(corrupt(format!("unsupported layout version {}", record.version)));
    }
    if key.strip_prefix(SNAPSHOT_KEY_PREFIX) != Some(record.backup_id.as_str()) {
        return Err(corrupt(format!("entry holds snapshot {}", record.backup_id)));
    }

    // Older writers stored extra metadata (e.g. lastUpdated) beside the sections.
    for reserved in RESERVED_KEYS {
        record.sections.remove(reserved);
    }
    Ok(record)
}
