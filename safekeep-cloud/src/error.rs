//! Remote sync error types.

use safekeep_storage::StorageError;
use thiserror::Error;

/// Result type for remote operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors that can occur talking to the remote store.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("remote object changed since it was read")]
    Conflict,

    #[error("credential rejected: {0}")]
    Unauthorized(String),

    #[error("network unavailable: {0}")]
    TransientNetwork(String),

    #[error("API request failed: {0}")]
    Api(String),

    #[error("remote sync is not enabled")]
    SyncDisabled,

    #[error("malformed remote object: {0}")]
    Malformed(String),

    #[error("section '{0}' collides with a reserved metadata key")]
    ReservedSection(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("local storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CloudError {
    /// True when a later attempt can be expected to succeed without any
    /// change on the caller's side.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CloudError::TransientNetwork(_) | CloudError::Conflict)
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CloudError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for CloudError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            CloudError::TransientNetwork(e.to_string())
        } else if e.is_decode() || e.is_body() {
            CloudError::Malformed(e.to_string())
        } else {
            CloudError::Api(e.to_string())
        }
    }
}
