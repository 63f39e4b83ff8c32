use crate::error::{StorageError, StorageResult};
use crate::kv::{entry_size, KvStore};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Entries {
    values: HashMap<String, (u64, String)>,
    next_seq: u64,
    used_bytes: u64,
}

/// Volatile key-value store, optionally capped at a byte quota.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<Entries>,
    quota_bytes: Option<u64>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes once `quota_bytes` would be exceeded.
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Bytes currently used by keys and values.
    pub fn used_bytes(&self) -> u64 {
        self.lock().used_bytes
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock().values.get(key).map(|(_, v)| v.clone()))
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.lock();
        let previous = entries
            .values
            .get(key)
            .map(|(_, v)| entry_size(key, v))
            .unwrap_or(0);
        let needed = entries.used_bytes - previous + entry_size(key, value);

        if let Some(quota) = self.quota_bytes {
            if needed > quota {
                return Err(StorageError::StorageFull { needed, quota });
            }
        }

        let seq = match entries.values.get(key) {
            Some((seq, _)) => *seq,
            None => {
                entries.next_seq += 1;
                entries.next_seq
            }
        };
        entries.values.insert(key.to_string(), (seq, value.to_string()));
        entries.used_bytes = needed;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let mut entries = self.lock();
        match entries.values.remove(key) {
            Some((_, value)) => {
                entries.used_bytes -= entry_size(key, &value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let entries = self.lock();
        let mut keys: Vec<(u64, &String)> = entries
            .values
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, (seq, _))| (*seq, k))
            .collect();
        keys.sort_by_key(|(seq, _)| *seq);
        Ok(keys.into_iter().map(|(_, k)| k.clone()).collect())
    }
}
