//! Shared helpers for backup integration tests.
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use safekeep_backup::{BackupConfig, BackupContext, StateProvider};
use safekeep_cloud::{Credential, CredentialManager, MemoryRemoteStore, RemoteLocation, SyncCoordinator};
use safekeep_storage::{KvStore, MemoryKvStore};
use safekeep_types::{ManualClock, StateBlob};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory application state that counts reads.
#[derive(Default)]
pub struct TestProvider {
    state: Mutex<StateBlob>,
    applied: Mutex<Vec<StateBlob>>,
    reads: AtomicU32,
    fail_reads: std::sync::atomic::AtomicBool,
}

impl TestProvider {
    pub fn with_state(state: StateBlob) -> Arc<Self> {
        let provider = Self::default();
        *provider.state.lock().unwrap() = state;
        Arc::new(provider)
    }

    pub fn set_state(&self, state: StateBlob) {
        *self.state.lock().unwrap() = state;
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn applied(&self) -> Vec<StateBlob> {
        self.applied.lock().unwrap().clone()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

impl StateProvider for TestProvider {
    fn read_current_state(&self) -> anyhow::Result<StateBlob> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("state unavailable");
        }
        Ok(self.state.lock().unwrap().clone())
    }

    fn apply_state(&self, state: &StateBlob) -> anyhow::Result<()> {
        self.applied.lock().unwrap().push(state.clone());
        *self.state.lock().unwrap() = state.clone();
        Ok(())
    }
}

pub fn workspace_state(tag: &str) -> StateBlob {
    StateBlob::new()
        .with_section("clients", json!([{"name": tag}]))
        .with_section("tasks", json!([]))
        .with_section("settings", json!({"currency": "EUR"}))
        .with_section("mode", json!("service"))
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()))
}

pub fn location() -> RemoteLocation {
    RemoteLocation {
        owner: "acme".into(),
        collection: "backup".into(),
        ..RemoteLocation::default()
    }
}

pub async fn enabled_credentials(kv: Arc<dyn KvStore>) -> Arc<CredentialManager> {
    let manager = CredentialManager::load(kv, location()).unwrap();
    manager
        .set_credential(Credential::new("tok").unwrap())
        .await
        .unwrap();
    Arc::new(manager)
}

pub struct Harness {
    pub kv: Arc<MemoryKvStore>,
    pub clock: Arc<ManualClock>,
    pub provider: Arc<TestProvider>,
    pub remote: Arc<MemoryRemoteStore>,
    pub credentials: Arc<CredentialManager>,
    pub context: Arc<BackupContext>,
}

/// Context over an in-memory store, mirrored to an in-memory remote with
/// sync enabled.
pub async fn harness(config: BackupConfig, state: StateBlob) -> Harness {
    harness_with_kv(config, state, Arc::new(MemoryKvStore::new())).await
}

pub async fn harness_with_kv(
    config: BackupConfig,
    state: StateBlob,
    kv: Arc<MemoryKvStore>,
) -> Harness {
    let clock = clock();
    let provider = TestProvider::with_state(state);
    let remote = Arc::new(MemoryRemoteStore::new());
    let credentials = enabled_credentials(Arc::new(MemoryKvStore::new())).await;
    let context = BackupContext::new(config, kv.clone(), clock.clone(), provider.clone())
        .unwrap()
        .with_remote(SyncCoordinator::new(remote.clone()), credentials.clone());

    Harness {
        kv,
        clock,
        provider,
        remote,
        credentials,
        context: Arc::new(context),
    }
}
