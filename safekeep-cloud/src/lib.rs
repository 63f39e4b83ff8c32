//! Remote mirror for Safekeep.
//!
//! Keeps one named object on an HTTP content API in step with local state:
//! - [`RemoteStore`]: versioned read and compare-and-swap write of the object
//! - [`ContentApiClient`]: the HTTP implementation
//! - [`MemoryRemoteStore`]: an in-process implementation for tests and offline use
//! - [`CredentialManager`]: sync enablement and the persisted credential
//! - [`SyncCoordinator`]: one push or pull pass with bounded conflict retry

pub mod api_client;
pub mod config;
pub mod credential_manager;
pub mod error;
pub mod memory_store;
pub mod remote_store;
pub mod sync_engine;
pub mod types;

pub use api_client::ContentApiClient;
pub use config::{CloudConfig, RemoteLocation};
pub use credential_manager::{Credential, CredentialManager, SyncConfig, SyncStatus};
pub use error::{CloudError, CloudResult};
pub use memory_store::MemoryRemoteStore;
pub use remote_store::RemoteStore;
pub use sync_engine::{PushReport, SyncCoordinator};
pub use types::{RemoteObject, VersionToken};
