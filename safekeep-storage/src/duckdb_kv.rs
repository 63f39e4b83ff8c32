//! Durable key-value store backed by a single DuckDB table.

use crate::error::{StorageError, StorageResult};
use crate::kv::{entry_size, KvStore};
use duckdb::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Buffer pool cap for each store connection.
const MEMORY_LIMIT: &str = "64MB";
/// Worker threads per connection. Access is serialized behind one mutex.
const THREADS: u32 = 1;

/// Key-value store persisted in DuckDB.
///
/// Entries live in a `kv_entries` table; a sequence column records first
/// insertion so prefix scans come back in insertion order.
#[derive(Clone)]
pub struct DuckDbKvStore {
    conn: Arc<Mutex<Connection>>,
    quota_bytes: Option<u64>,
}

impl DuckDbKvStore {
    /// Opens or creates a store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = open_connection(path)?;
        initialize_kv_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            quota_bytes: None,
        })
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_kv_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            quota_bytes: None,
        })
    }

    /// Caps the total bytes of keys and values the store will accept.
    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    /// Bytes currently used by keys and values.
    pub fn used_bytes(&self) -> StorageResult<u64> {
        let conn = self.lock();
        let bytes: i64 = conn.query_row(
            "SELECT CAST(COALESCE(SUM(strlen(entry_key) + strlen(entry_value)), 0) AS BIGINT) FROM kv_entries",
            [],
            |row| row.get(0),
        )?;
        Ok(bytes as u64)
    }

    /// Acquire the connection lock, recovering from poison.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("recovering from poisoned kv connection mutex");
            PoisonError::into_inner(poisoned)
        })
    }
}

impl KvStore for DuckDbKvStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.lock();
        let result = conn.query_row(
            "SELECT entry_value FROM kv_entries WHERE entry_key = ?",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.lock();

        if let Some(quota) = self.quota_bytes {
            let others: i64 = conn.query_row(
                "SELECT CAST(COALESCE(SUM(strlen(entry_key) + strlen(entry_value)), 0) AS BIGINT) \
                 FROM kv_entries WHERE entry_key <> ?",
                params![key],
                |row| row.get(0),
            )?;
            let needed = others as u64 + entry_size(key, value);
            if needed > quota {
                return Err(StorageError::StorageFull { needed, quota });
            }
        }

        let now = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO kv_entries (entry_key, entry_value, seq, updated_at) \
             VALUES (?, ?, nextval('kv_entries_seq'), ?) \
             ON CONFLICT (entry_key) DO UPDATE SET \
                entry_value = excluded.entry_value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let conn = self.lock();
        let deleted = conn.execute("DELETE FROM kv_entries WHERE entry_key = ?", params![key])?;
        Ok(deleted > 0)
    }

    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT entry_key FROM kv_entries WHERE starts_with(entry_key, ?) ORDER BY seq",
        )?;
        let keys = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

/// Opens `path`, discarding a write-ahead log left by an unclean shutdown if
/// it keeps the database from opening.
fn open_connection(path: &Path) -> StorageResult<Connection> {
    let conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(e) => {
            let wal = wal_path(path);
            if !wal.exists() {
                return Err(e.into());
            }
            tracing::warn!(
                "cannot open {}: {e}; discarding stale {}",
                path.display(),
                wal.display()
            );
            if std::fs::remove_file(&wal).is_err() {
                return Err(e.into());
            }
            Connection::open(path)?
        }
    };
    conn.execute_batch(&format!(
        "SET memory_limit = '{MEMORY_LIMIT}'; SET threads = {THREADS};"
    ))?;
    Ok(conn)
}

fn wal_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".wal");
    PathBuf::from(name)
}

fn initialize_kv_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE SEQUENCE IF NOT EXISTS kv_entries_seq START 1;
        CREATE TABLE IF NOT EXISTS kv_entries (
            entry_key VARCHAR PRIMARY KEY,
            entry_value VARCHAR NOT NULL,
            seq BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wal_sits_next_to_the_database() {
        assert_eq!(
            wal_path(Path::new("/data/backups.duckdb")),
            PathBuf::from("/data/backups.duckdb.wal")
        );
        assert_eq!(wal_path(Path::new("store")), PathBuf::from("store.wal"));
    }
}
