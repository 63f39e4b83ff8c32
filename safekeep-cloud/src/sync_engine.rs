//! One-pass synchronization against the remote object.
//!
//! A push reads the remote version, then writes the local state against it.
//! If another writer got in between, the write is refused with a conflict;
//! the coordinator re-reads once and retries once with the fresh version.
//! A second conflict is reported, never retried further. The result is
//! last-writer-wins over the whole object: nothing is merged.

use crate::error::{CloudError, CloudResult};
use crate::remote_store::RemoteStore;
use crate::types::VersionToken;
use safekeep_types::StateBlob;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a successful push.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushReport {
    /// Version the remote holds after the write.
    pub version: VersionToken,
    /// True when the write created the object.
    pub created: bool,
    /// Write attempts made, 1 or 2.
    pub attempts: u32,
}

/// Runs push and pull passes through a [`RemoteStore`].
#[derive(Clone)]
pub struct SyncCoordinator {
    remote: Arc<dyn RemoteStore>,
}

impl SyncCoordinator {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// Replaces the remote object with `state`.
    pub async fn push(&self, state: &StateBlob) -> CloudResult<PushReport> {
        let observed = self.remote.get_object().await?.map(|obj| obj.version);
        self.push_from(state, observed).await
    }

    /// Replaces the remote object with `state`, assuming the remote was last
    /// seen at `observed` (`None`: the object did not exist).
    ///
    /// Unauthorized and network failures are returned at once. A conflict is
    /// retried exactly once after re-reading the current version.
    pub async fn push_from(
        &self,
        state: &StateBlob,
        observed: Option<VersionToken>,
    ) -> CloudResult<PushReport> {
        match self.remote.put_object(state, observed.as_ref()).await {
            Ok(version) => {
                let created = observed.is_none();
                info!(
                    "remote object {} at version {version}",
                    if created { "created" } else { "updated" }
                );
                return Ok(PushReport {
                    version,
                    created,
                    attempts: 1,
                });
            }
            Err(CloudError::Conflict) => {
                warn!("remote object changed during push, retrying with the latest version");
            }
            Err(e) => {
                warn!("push failed: {e}");
                return Err(e);
            }
        }

        let fresh = self.remote.get_object().await?.map(|obj| obj.version);
        debug!(
            "retrying push against {}",
            fresh.as_ref().map_or("no object", VersionToken::as_str)
        );

        match self.remote.put_object(state, fresh.as_ref()).await {
            Ok(version) => {
                info!("remote object updated at version {version} after conflict retry");
                Ok(PushReport {
                    version,
                    created: fresh.is_none(),
                    attempts: 2,
                })
            }
            Err(e) => {
                warn!("push retry failed: {e}");
                Err(e)
            }
        }
    }

    /// Reads the remote payload as stored. `None` if never written.
    pub async fn pull(&self) -> CloudResult<Option<StateBlob>> {
        let object = self.remote.get_object().await?;
        match &object {
            Some(obj) => debug!("pulled remote object at version {}", obj.version),
            None => debug!("no remote object to pull"),
        }
        Ok(object.map(|obj| obj.payload))
    }
}
