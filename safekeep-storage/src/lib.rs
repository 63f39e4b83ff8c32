//! Local storage layer for Safekeep.
//!
//! Provides a persistent key-value store (DuckDB-backed, with an in-memory
//! variant for tests) and the snapshot retention engine built on top of it.
//!
//! # Architecture
//!
//! - Values are whole serialized text blobs addressed by string keys
//! - Keys remember their insertion order so retention ties are stable
//! - An optional byte quota makes capacity failures observable as
//!   [`StorageError::StorageFull`]
//! - Snapshots live under the `backup_` key prefix

mod duckdb_kv;
mod error;
mod kv;
mod memory_kv;
mod snapshot_store;

pub use duckdb_kv::DuckDbKvStore;
pub use error::{StorageError, StorageResult};
pub use kv::{entry_size, KvStore};
pub use memory_kv::MemoryKvStore;
pub use snapshot_store::{
    Snapshot, SnapshotInfo, SnapshotScan, SnapshotStore, DEFAULT_MAX_RETAINED,
    SNAPSHOT_KEY_PREFIX,
};
