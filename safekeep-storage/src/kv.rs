use crate::error::StorageResult;

/// A persistent key-value store of whole text values.
///
/// Implementations must report keys in insertion order (overwriting an
/// existing key keeps its original position).
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes `value` under `key`, replacing any previous value.
    ///
    /// Fails with [`StorageFull`](crate::StorageError::StorageFull) when the
    /// write would exceed the store's quota; the previous value is kept.
    fn put(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes `key`. Returns whether it existed.
    fn remove(&self, key: &str) -> StorageResult<bool>;

    /// All keys beginning with `prefix`, oldest insertion first.
    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// Bytes an entry occupies for quota accounting.
pub fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}
