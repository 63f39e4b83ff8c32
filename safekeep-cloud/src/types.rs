//! Shared types for remote sync operations.

use crate::error::{CloudError, CloudResult};
use chrono::{DateTime, Utc};
use safekeep_types::{iso8601, StateBlob, FORMAT_VERSION, RESERVED_KEYS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Opaque token naming the exact remote state last observed or written.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The remote object as currently stored.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteObject {
    pub version: VersionToken,
    pub payload: StateBlob,
    /// Absent when the stored document predates the `lastUpdated` field.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Serialized remote document:
/// `{ <sections...>, "lastUpdated": "<ISO-8601>", "version": "1.0" }`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteDocument {
    #[serde(flatten)]
    sections: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

/// Encodes `payload` as the pretty-printed remote document.
pub fn encode_document(payload: &StateBlob, updated_at: DateTime<Utc>) -> CloudResult<Vec<u8>> {
    if let Some(section) = payload.reserved_section() {
        return Err(CloudError::ReservedSection(section.to_string()));
    }
    let document = RemoteDocument {
        sections: payload.clone().into_sections(),
        last_updated: Some(iso8601::format(&updated_at)),
        version: Some(FORMAT_VERSION.to_string()),
    };
    Ok(serde_json::to_vec_pretty(&document)?)
}

/// Decodes a remote document back into its payload and update time.
///
/// Metadata keys never leak into the payload, even when an older writer
/// stored extra ones beside the sections.
pub fn decode_document(bytes: &[u8]) -> CloudResult<(StateBlob, Option<DateTime<Utc>>)> {
    let mut document: RemoteDocument =
        serde_json::from_slice(bytes).map_err(|e| CloudError::Malformed(e.to_string()))?;

    if let Some(version) = &document.version {
        if !version.starts_with("1.") {
            return Err(CloudError::Malformed(format!(
                "unsupported document version {version}"
            )));
        }
    }
    for reserved in RESERVED_KEYS {
        document.sections.remove(reserved);
    }

    let updated_at = document.last_updated.as_deref().and_then(iso8601::parse);
    Ok((StateBlob::from_sections(document.sections), updated_at))
}

// ── Content API wire types ──

/// `GET /repos/{owner}/{collection}/contents/{path}` response.
#[derive(Debug, Deserialize)]
pub(crate) struct ContentsResponse {
    pub sha: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// `PUT /repos/{owner}/{collection}/contents/{path}` request body.
#[derive(Debug, Serialize)]
pub(crate) struct PutContentsRequest<'a> {
    pub message: &'a str,
    pub content: String,
    pub branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PutContentsResponse {
    pub content: PutContentsEntry,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PutContentsEntry {
    pub sha: String,
}
