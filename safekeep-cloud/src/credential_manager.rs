//! Sync enablement and credential lifecycle.
//!
//! The credential and the enablement flag are persisted in the local
//! key-value store and loaded once at process start. Enabled sync always
//! carries a credential; a credential the server rejects stops pushes until
//! a new one is set.

use crate::config::RemoteLocation;
use crate::error::{CloudError, CloudResult};
use safekeep_storage::KvStore;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Local store key holding the credential.
pub const CREDENTIAL_KEY: &str = "sync_credential";
/// Local store key holding `"true"` or `"false"`.
pub const ENABLED_KEY: &str = "sync_enabled";
/// Key older installs stored the credential under. Read when
/// [`CREDENTIAL_KEY`] is absent.
pub const LEGACY_CREDENTIAL_KEY: &str = "github-token";

/// Bearer-style secret for the content API. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> CloudResult<Self> {
        let secret = secret.into().trim().to_string();
        if secret.is_empty() {
            return Err(CloudError::Config("credential must not be empty".to_string()));
        }
        Ok(Self(secret))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Remote sync settings. `enabled` implies a credential is present.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    enabled: bool,
    credential: Option<Credential>,
    location: RemoteLocation,
}

impl SyncConfig {
    pub fn disabled(location: RemoteLocation) -> Self {
        Self {
            enabled: false,
            credential: None,
            location,
        }
    }

    pub fn enabled(credential: Credential, location: RemoteLocation) -> Self {
        Self {
            enabled: true,
            credential: Some(credential),
            location,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn location(&self) -> &RemoteLocation {
        &self.location
    }
}

/// Summary of the sync settings, safe to display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub enabled: bool,
    pub has_credential: bool,
    pub credential_rejected: bool,
    pub owner: String,
    pub collection: String,
    pub object_name: String,
}

/// Owns the process-wide [`SyncConfig`] and keeps it persisted.
pub struct CredentialManager {
    kv: Arc<dyn KvStore>,
    config: RwLock<SyncConfig>,
    rejected: AtomicBool,
}

impl CredentialManager {
    /// Loads persisted settings. Unreadable values count as absent.
    pub fn load(kv: Arc<dyn KvStore>, location: RemoteLocation) -> CloudResult<Self> {
        let stored = match kv.get(CREDENTIAL_KEY)? {
            Some(raw) => Some(raw),
            None => kv.get(LEGACY_CREDENTIAL_KEY)?,
        };
        let credential = stored.and_then(|raw| Credential::new(raw).ok());
        let flag = kv.get(ENABLED_KEY)?;
        let paused = flag.as_deref().map(str::trim) == Some("false");

        let config = match credential {
            Some(credential) if !paused => {
                info!("remote sync enabled");
                SyncConfig::enabled(credential, location)
            }
            Some(credential) => {
                debug!("remote sync paused with a stored credential");
                SyncConfig {
                    enabled: false,
                    credential: Some(credential),
                    location,
                }
            }
            None => {
                info!("remote sync disabled: no credential");
                SyncConfig::disabled(location)
            }
        };

        Ok(Self {
            kv,
            config: RwLock::new(config),
            rejected: AtomicBool::new(false),
        })
    }

    /// Stores a new credential and enables sync.
    ///
    /// If the enabled flag cannot be written, the previous credential is put
    /// back and the in-memory settings stay as they were.
    pub async fn set_credential(&self, credential: Credential) -> CloudResult<()> {
        let previous = self.kv.get(CREDENTIAL_KEY)?;
        self.kv.put(CREDENTIAL_KEY, credential.expose())?;
        if let Err(e) = self.kv.put(ENABLED_KEY, "true") {
            self.restore_credential(previous.as_deref());
            return Err(e.into());
        }

        let mut config = self.config.write().await;
        let location = config.location.clone();
        *config = SyncConfig::enabled(credential, location);
        self.rejected.store(false, Ordering::SeqCst);

        info!("sync credential set, remote sync enabled");
        Ok(())
    }

    /// Deletes the credential and disables sync.
    pub async fn remove_credential(&self) -> CloudResult<()> {
        self.kv.remove(CREDENTIAL_KEY)?;
        self.kv.remove(LEGACY_CREDENTIAL_KEY)?;
        self.kv.put(ENABLED_KEY, "false")?;

        let mut config = self.config.write().await;
        let location = config.location.clone();
        *config = SyncConfig::disabled(location);
        self.rejected.store(false, Ordering::SeqCst);

        info!("sync credential removed, remote sync disabled");
        Ok(())
    }

    /// Disables sync but keeps the stored credential.
    pub async fn pause(&self) -> CloudResult<()> {
        self.kv.put(ENABLED_KEY, "false")?;
        self.config.write().await.enabled = false;
        info!("remote sync paused");
        Ok(())
    }

    /// Re-enables sync with the stored credential.
    pub async fn resume(&self) -> CloudResult<()> {
        let mut config = self.config.write().await;
        if config.credential.is_none() {
            return Err(CloudError::Config(
                "cannot resume sync without a credential".to_string(),
            ));
        }
        self.kv.put(ENABLED_KEY, "true")?;
        config.enabled = true;
        info!("remote sync resumed");
        Ok(())
    }

    /// The credential to present, if sync is enabled.
    pub async fn credential(&self) -> Option<Credential> {
        let config = self.config.read().await;
        if config.enabled {
            config.credential.clone()
        } else {
            None
        }
    }

    pub async fn is_enabled(&self) -> bool {
        self.config.read().await.enabled
    }

    /// Records that the server refused the current credential.
    pub fn mark_rejected(&self) {
        if !self.rejected.swap(true, Ordering::SeqCst) {
            warn!("sync credential rejected by the server; pushes stop until it is replaced");
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected.load(Ordering::SeqCst)
    }

    pub async fn sync_config(&self) -> SyncConfig {
        self.config.read().await.clone()
    }

    fn restore_credential(&self, previous: Option<&str>) {
        let restored = match previous {
            Some(value) => self.kv.put(CREDENTIAL_KEY, value),
            None => self.kv.remove(CREDENTIAL_KEY).map(|_| ()),
        };
        if let Err(e) = restored {
            warn!("could not roll back the stored credential: {e}");
        }
    }

    pub async fn status(&self) -> SyncStatus {
        let config = self.config.read().await;
        SyncStatus {
            enabled: config.enabled,
            has_credential: config.credential.is_some(),
            credential_rejected: self.is_rejected(),
            owner: config.location.owner.clone(),
            collection: config.location.collection.clone(),
            object_name: config.location.object_name.clone(),
        }
    }
}
