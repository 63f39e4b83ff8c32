//! In-process [`RemoteStore`] with the same versioning rules as the HTTP one.

use crate::error::{CloudError, CloudResult};
use crate::remote_store::RemoteStore;
use crate::types::{decode_document, encode_document, RemoteObject, VersionToken};
use async_trait::async_trait;
use safekeep_types::{Clock, StateBlob, SystemClock};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Default)]
struct Inner {
    object: Option<(VersionToken, Vec<u8>)>,
    writes: u64,
    offline: bool,
}

/// Remote store kept in memory.
///
/// Every successful write produces a fresh version, even when the content is
/// unchanged. Can be switched offline to simulate network failures.
pub struct MemoryRemoteStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
        }
    }

    /// While offline every call fails with [`CloudError::TransientNetwork`].
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    /// Current version, if the object exists.
    pub fn current_version(&self) -> Option<VersionToken> {
        self.lock().object.as_ref().map(|(v, _)| v.clone())
    }

    /// Raw stored document, if the object exists.
    pub fn document(&self) -> Option<Vec<u8>> {
        self.lock().object.as_ref().map(|(_, doc)| doc.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

fn version_for(seq: u64, document: &[u8]) -> VersionToken {
    let mut hasher = Sha256::new();
    hasher.update(seq.to_be_bytes());
    hasher.update(document);
    VersionToken::new(hex::encode(hasher.finalize()))
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get_object(&self) -> CloudResult<Option<RemoteObject>> {
        let inner = self.lock();
        if inner.offline {
            return Err(CloudError::TransientNetwork("remote offline".to_string()));
        }
        let Some((version, document)) = &inner.object else {
            return Ok(None);
        };
        let (payload, updated_at) = decode_document(document)?;
        Ok(Some(RemoteObject {
            version: version.clone(),
            payload,
            updated_at,
        }))
    }

    async fn put_object(
        &self,
        payload: &StateBlob,
        expected_version: Option<&VersionToken>,
    ) -> CloudResult<VersionToken> {
        let document = encode_document(payload, self.clock.now())?;

        let mut inner = self.lock();
        if inner.offline {
            return Err(CloudError::TransientNetwork("remote offline".to_string()));
        }

        let current = inner.object.as_ref().map(|(v, _)| v);
        if current != expected_version {
            debug!(
                "rejecting write: expected {:?}, current {:?}",
                expected_version.map(VersionToken::as_str),
                current.map(VersionToken::as_str)
            );
            return Err(CloudError::Conflict);
        }

        inner.writes += 1;
        let version = version_for(inner.writes, &document);
        inner.object = Some((version.clone(), document));
        Ok(version)
    }
}
