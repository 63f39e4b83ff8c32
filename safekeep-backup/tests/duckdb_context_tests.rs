mod support;

use chrono::Duration;
use pretty_assertions::assert_eq;
use safekeep_backup::{BackupConfig, BackupContext, CycleOutcome};
use safekeep_storage::{DuckDbKvStore, KvStore};
use std::sync::Arc;
use support::{workspace_state, TestProvider};

fn open(path: &std::path::Path) -> Arc<dyn KvStore> {
    Arc::new(DuckDbKvStore::open(path).unwrap())
}

#[tokio::test]
async fn snapshots_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backups.duckdb");
    let clock = support::clock();

    let first = {
        let provider = TestProvider::with_state(workspace_state("a"));
        let context =
            BackupContext::new(BackupConfig::default(), open(&path), clock.clone(), provider)
                .unwrap();
        let CycleOutcome::Completed(first) = context.run_cycle().await.unwrap() else {
            panic!("expected a completed cycle");
        };
        clock.advance(Duration::minutes(5));
        context.run_cycle().await.unwrap();
        first.snapshot
    };

    let provider = TestProvider::with_state(workspace_state("b"));
    let context =
        BackupContext::new(BackupConfig::default(), open(&path), clock, provider.clone()).unwrap();

    let listed = context.list_backups().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[1], first);

    context.restore_backup(&first.id).await.unwrap();
    assert_eq!(provider.applied(), vec![workspace_state("a")]);
}

#[tokio::test]
async fn retention_holds_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backups.duckdb");
    let clock = support::clock();
    let config = BackupConfig {
        max_retained: 2,
        ..BackupConfig::default()
    };
    let provider = TestProvider::with_state(workspace_state("a"));
    let context = BackupContext::new(config, open(&path), clock.clone(), provider).unwrap();

    for _ in 0..4 {
        context.run_cycle().await.unwrap();
        clock.advance(Duration::minutes(5));
    }

    assert_eq!(context.list_backups().unwrap().len(), 2);
}
