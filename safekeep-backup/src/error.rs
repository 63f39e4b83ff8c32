use safekeep_cloud::CloudError;
use safekeep_storage::StorageError;
use safekeep_types::SnapshotId;
use thiserror::Error;

pub type BackupResult<T> = Result<T, BackupError>;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("local storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("remote sync error: {0}")]
    Cloud(#[from] CloudError),

    #[error("application state error: {0}")]
    Provider(#[source] anyhow::Error),

    #[error("snapshot {0} not found")]
    SnapshotNotFound(SnapshotId),

    #[error("remote object not found")]
    RemoteNotFound,

    #[error("another backup or restore is in progress")]
    Busy,

    #[error("invalid configuration: {0}")]
    Config(String),
}
