use async_trait::async_trait;
use pretty_assertions::assert_eq;
use safekeep_cloud::{
    CloudError, CloudResult, MemoryRemoteStore, RemoteObject, RemoteStore, SyncCoordinator,
    VersionToken,
};
use safekeep_types::StateBlob;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

fn state(tag: &str) -> StateBlob {
    StateBlob::new()
        .with_section("clients", json!([{"name": tag}]))
        .with_section("settings", json!({"owner": tag}))
}

/// Remote store that replays scripted write outcomes and counts calls.
struct ScriptedStore {
    puts: Mutex<VecDeque<CloudResult<VersionToken>>>,
    put_calls: AtomicU32,
    get_calls: AtomicU32,
    seen_versions: Mutex<Vec<Option<String>>>,
}

impl ScriptedStore {
    fn new(puts: Vec<CloudResult<VersionToken>>) -> Self {
        Self {
            puts: Mutex::new(puts.into()),
            put_calls: AtomicU32::new(0),
            get_calls: AtomicU32::new(0),
            seen_versions: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RemoteStore for ScriptedStore {
    async fn get_object(&self) -> CloudResult<Option<RemoteObject>> {
        let n = self.get_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Some(RemoteObject {
            version: VersionToken::new(format!("v{n}")),
            payload: StateBlob::new(),
            updated_at: None,
        }))
    }

    async fn put_object(
        &self,
        _payload: &StateBlob,
        expected_version: Option<&VersionToken>,
    ) -> CloudResult<VersionToken> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_versions
            .lock()
            .unwrap()
            .push(expected_version.map(|v| v.as_str().to_string()));
        self.puts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(CloudError::Api("script exhausted".into())))
    }
}

// ── Push / pull ──────────────────────────────────────────────────

#[tokio::test]
async fn push_creates_absent_object_then_pull_returns_it() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let sync = SyncCoordinator::new(remote.clone());

    assert_eq!(sync.pull().await.unwrap(), None);

    let report = sync.push(&state("x")).await.unwrap();
    assert!(report.created);
    assert_eq!(report.attempts, 1);
    assert_eq!(remote.current_version(), Some(report.version));

    assert_eq!(sync.pull().await.unwrap(), Some(state("x")));
}

#[tokio::test]
async fn push_updates_existing_object() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let sync = SyncCoordinator::new(remote.clone());

    let first = sync.push(&state("a")).await.unwrap();
    let second = sync.push(&state("b")).await.unwrap();

    assert!(!second.created);
    assert_ne!(first.version, second.version);
    assert_eq!(remote.write_count(), 2);
    assert_eq!(sync.pull().await.unwrap(), Some(state("b")));
}

#[tokio::test]
async fn identical_pushes_still_get_new_versions() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let sync = SyncCoordinator::new(remote.clone());

    let first = sync.push(&state("same")).await.unwrap();
    let second = sync.push(&state("same")).await.unwrap();
    assert_ne!(first.version, second.version);
}

// ── Conflicts ────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_writer_causes_exactly_one_retry() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let writer_a = SyncCoordinator::new(remote.clone());
    let writer_b = SyncCoordinator::new(remote.clone());

    writer_a.push(&state("seed")).await.unwrap();

    // A observes v1.
    let v1 = remote.current_version();
    // B writes v2 in between.
    let b = writer_b.push(&state("b")).await.unwrap();
    assert_ne!(Some(&b.version), v1.as_ref());

    let a = writer_a.push_from(&state("a"), v1).await.unwrap();
    assert_eq!(a.attempts, 2);
    assert!(!a.created);
    assert_ne!(a.version, b.version);

    // Last writer wins over the whole object.
    assert_eq!(writer_b.pull().await.unwrap(), Some(state("a")));
}

#[tokio::test]
async fn concurrent_create_retries_as_update() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let writer_a = SyncCoordinator::new(remote.clone());
    let writer_b = SyncCoordinator::new(remote.clone());

    // A saw no object; B creates it first.
    writer_b.push(&state("b")).await.unwrap();
    let a = writer_a.push_from(&state("a"), None).await.unwrap();

    assert_eq!(a.attempts, 2);
    assert!(!a.created);
    assert_eq!(remote.write_count(), 2);
}

#[tokio::test]
async fn second_conflict_is_reported_without_further_retries() {
    let store = Arc::new(ScriptedStore::new(vec![
        Err(CloudError::Conflict),
        Err(CloudError::Conflict),
        Ok(VersionToken::new("never")),
    ]));
    let sync = SyncCoordinator::new(store.clone());

    let result = sync.push(&state("a")).await;
    assert!(matches!(result, Err(CloudError::Conflict)));
    assert_eq!(store.put_calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.get_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        *store.seen_versions.lock().unwrap(),
        vec![Some("v1".to_string()), Some("v2".to_string())]
    );
}

#[tokio::test]
async fn retry_uses_freshly_read_version() {
    let store = Arc::new(ScriptedStore::new(vec![
        Err(CloudError::Conflict),
        Ok(VersionToken::new("v9")),
    ]));
    let sync = SyncCoordinator::new(store.clone());

    let report = sync.push(&state("a")).await.unwrap();
    assert_eq!(report.version.as_str(), "v9");
    assert_eq!(report.attempts, 2);
    assert_eq!(
        store.seen_versions.lock().unwrap().last().cloned().flatten(),
        Some("v2".to_string())
    );
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let store = Arc::new(ScriptedStore::new(vec![
        Err(CloudError::Unauthorized("bad credentials".into())),
        Ok(VersionToken::new("never")),
    ]));
    let sync = SyncCoordinator::new(store.clone());

    let result = sync.push(&state("a")).await;
    assert!(matches!(result, Err(CloudError::Unauthorized(_))));
    assert_eq!(store.put_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transient_failure_is_not_retried() {
    let store = Arc::new(ScriptedStore::new(vec![
        Err(CloudError::TransientNetwork("timeout".into())),
        Ok(VersionToken::new("never")),
    ]));
    let sync = SyncCoordinator::new(store.clone());

    let result = sync.push(&state("a")).await;
    assert!(matches!(result, Err(CloudError::TransientNetwork(_))));
    assert_eq!(store.put_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn offline_remote_fails_push_and_pull() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let sync = SyncCoordinator::new(remote.clone());
    remote.set_offline(true);

    assert!(matches!(
        sync.push(&state("a")).await,
        Err(CloudError::TransientNetwork(_))
    ));
    assert!(matches!(sync.pull().await, Err(CloudError::TransientNetwork(_))));

    remote.set_offline(false);
    sync.push(&state("a")).await.unwrap();
    assert_eq!(sync.pull().await.unwrap(), Some(state("a")));
}

// ── Memory store versioning ──────────────────────────────────────

#[tokio::test]
async fn memory_store_refuses_blind_overwrite() {
    let remote = MemoryRemoteStore::new();
    let v1 = remote.put_object(&state("a"), None).await.unwrap();

    let blind = remote.put_object(&state("b"), None).await;
    assert!(matches!(blind, Err(CloudError::Conflict)));

    let stale = remote
        .put_object(&state("b"), Some(&VersionToken::new("bogus")))
        .await;
    assert!(matches!(stale, Err(CloudError::Conflict)));

    remote.put_object(&state("b"), Some(&v1)).await.unwrap();
    assert_eq!(remote.write_count(), 2);
}

#[tokio::test]
async fn memory_store_rejects_version_for_absent_object() {
    let remote = MemoryRemoteStore::new();
    let result = remote
        .put_object(&state("a"), Some(&VersionToken::new("v1")))
        .await;
    assert!(matches!(result, Err(CloudError::Conflict)));
    assert!(remote.document().is_none());
}
