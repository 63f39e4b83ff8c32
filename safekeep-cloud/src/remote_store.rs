//! Versioned access to the single mirrored object.

use crate::error::CloudResult;
use crate::types::{RemoteObject, VersionToken};
use async_trait::async_trait;
use safekeep_types::StateBlob;

/// Read and compare-and-swap write of one named remote object.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches the current version and payload. `None` if never written.
    async fn get_object(&self) -> CloudResult<Option<RemoteObject>>;

    /// Writes `payload` and returns the new version.
    ///
    /// With `expected_version`, the write only succeeds if the remote's
    /// current version matches; otherwise it fails with
    /// [`CloudError::Conflict`](crate::CloudError::Conflict). Without it, the
    /// write only succeeds if the object does not exist yet.
    async fn put_object(
        &self,
        payload: &StateBlob,
        expected_version: Option<&VersionToken>,
    ) -> CloudResult<VersionToken>;
}
