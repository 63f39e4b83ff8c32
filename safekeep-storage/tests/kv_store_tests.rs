use safekeep_storage::{DuckDbKvStore, KvStore, MemoryKvStore, StorageError};

fn backends() -> Vec<(&'static str, Box<dyn KvStore>)> {
    vec![
        ("memory", Box::new(MemoryKvStore::new())),
        ("duckdb", Box::new(DuckDbKvStore::open_in_memory().unwrap())),
    ]
}

fn quota_backends(quota: u64) -> Vec<(&'static str, Box<dyn KvStore>)> {
    vec![
        ("memory", Box::new(MemoryKvStore::with_quota(quota))),
        (
            "duckdb",
            Box::new(DuckDbKvStore::open_in_memory().unwrap().with_quota(quota)),
        ),
    ]
}

// ── Basic operations ────────────────────────────────────────────

#[test]
fn get_missing_key_is_none() {
    for (name, kv) in backends() {
        assert_eq!(kv.get("nope").unwrap(), None, "{name}");
    }
}

#[test]
fn put_then_get() {
    for (name, kv) in backends() {
        kv.put("settings", r#"{"theme":"dark"}"#).unwrap();
        assert_eq!(
            kv.get("settings").unwrap().as_deref(),
            Some(r#"{"theme":"dark"}"#),
            "{name}"
        );
    }
}

#[test]
fn put_overwrites() {
    for (name, kv) in backends() {
        kv.put("mode", "service").unwrap();
        kv.put("mode", "sales").unwrap();
        assert_eq!(kv.get("mode").unwrap().as_deref(), Some("sales"), "{name}");
    }
}

#[test]
fn remove_reports_existence() {
    for (name, kv) in backends() {
        kv.put("k", "v").unwrap();
        assert!(kv.remove("k").unwrap(), "{name}");
        assert!(!kv.remove("k").unwrap(), "{name}");
        assert_eq!(kv.get("k").unwrap(), None, "{name}");
    }
}

// ── Prefix scans ────────────────────────────────────────────────

#[test]
fn prefix_scan_filters_and_keeps_insertion_order() {
    for (name, kv) in backends() {
        kv.put("backup_c", "3").unwrap();
        kv.put("sync_enabled", "true").unwrap();
        kv.put("backup_a", "1").unwrap();
        kv.put("backup_b", "2").unwrap();
        assert_eq!(
            kv.keys_with_prefix("backup_").unwrap(),
            vec!["backup_c", "backup_a", "backup_b"],
            "{name}"
        );
    }
}

#[test]
fn overwrite_keeps_original_position() {
    for (name, kv) in backends() {
        kv.put("backup_a", "1").unwrap();
        kv.put("backup_b", "2").unwrap();
        kv.put("backup_a", "1b").unwrap();
        assert_eq!(
            kv.keys_with_prefix("backup_").unwrap(),
            vec!["backup_a", "backup_b"],
            "{name}"
        );
    }
}

// ── Quota ───────────────────────────────────────────────────────

#[test]
fn write_over_quota_is_rejected() {
    for (name, kv) in quota_backends(16) {
        kv.put("a", "1234567").unwrap(); // 8 bytes
        let err = kv.put("b", "123456789").unwrap_err(); // would need 18
        assert!(
            matches!(err, StorageError::StorageFull { needed: 18, quota: 16 }),
            "{name}: {err}"
        );
        assert_eq!(kv.get("b").unwrap(), None, "{name}");
    }
}

#[test]
fn overwrite_counts_only_the_new_value() {
    for (name, kv) in quota_backends(10) {
        kv.put("a", "123456789").unwrap(); // 10 bytes, at quota
        kv.put("a", "987654321").unwrap();
        assert_eq!(kv.get("a").unwrap().as_deref(), Some("987654321"), "{name}");
    }
}

#[test]
fn remove_frees_quota() {
    for (name, kv) in quota_backends(10) {
        kv.put("a", "123456789").unwrap();
        assert!(kv.put("b", "1").is_err(), "{name}");
        kv.remove("a").unwrap();
        kv.put("b", "1").unwrap();
    }
}

#[test]
fn memory_store_tracks_used_bytes() {
    let kv = MemoryKvStore::new();
    kv.put("ab", "cde").unwrap();
    assert_eq!(kv.used_bytes(), 5);
    kv.remove("ab").unwrap();
    assert_eq!(kv.used_bytes(), 0);
}

// ── Durability ──────────────────────────────────────────────────

#[test]
fn duckdb_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("safekeep.duckdb");

    {
        let kv = DuckDbKvStore::open(&path).unwrap();
        kv.put("backup_x", "{}").unwrap();
        kv.put("sync_enabled", "true").unwrap();
    }

    let kv = DuckDbKvStore::open(&path).unwrap();
    assert_eq!(kv.get("sync_enabled").unwrap().as_deref(), Some("true"));
    assert_eq!(kv.keys_with_prefix("backup_").unwrap(), vec!["backup_x"]);
}

#[test]
fn duckdb_store_reports_used_bytes() {
    let kv = DuckDbKvStore::open_in_memory().unwrap();
    kv.put("ab", "cde").unwrap();
    assert_eq!(kv.used_bytes().unwrap(), 5);
}
