//! Remote sync configuration.

use crate::error::{CloudError, CloudResult};
use serde::{Deserialize, Serialize};

/// Where the mirrored object lives on the content API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLocation {
    /// Account that owns the collection.
    pub owner: String,
    /// Collection (repository) holding the object.
    pub collection: String,
    /// Object path inside the collection.
    pub object_name: String,
}

impl Default for RemoteLocation {
    fn default() -> Self {
        Self {
            owner: String::new(),
            collection: String::new(),
            object_name: "all-data.json".to_string(),
        }
    }
}

/// Configuration for the content API client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Base URL of the content API (e.g., "https://api.github.com").
    pub api_base_url: String,

    pub location: RemoteLocation,

    /// Branch the object is read from and committed to.
    pub branch: String,

    /// Commit message attached to every write.
    pub commit_message: String,

    /// Per-request transport timeout. Nothing above the transport enforces
    /// a deadline on a whole push.
    pub request_timeout_secs: u64,

    pub user_agent: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            location: RemoteLocation::default(),
            branch: "main".to_string(),
            commit_message: "Auto-sync data".to_string(),
            request_timeout_secs: 30,
            user_agent: "safekeep".to_string(),
        }
    }
}

impl CloudConfig {
    /// Checks that every field needed to address the remote object is set.
    pub fn validate(&self) -> CloudResult<()> {
        let required = [
            ("api_base_url", &self.api_base_url),
            ("location.owner", &self.location.owner),
            ("location.collection", &self.location.collection),
            ("location.object_name", &self.location.object_name),
            ("branch", &self.branch),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(CloudError::Config(format!("missing {name}")));
        }
        if self.request_timeout_secs == 0 {
            return Err(CloudError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
