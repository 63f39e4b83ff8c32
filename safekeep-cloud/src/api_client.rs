//! HTTP client for the content API.
//!
//! The mirrored object is a single file in a repository-style collection:
//! `GET` returns its `sha` (the version token) and base64 content, `PUT`
//! writes new content and is rejected when the supplied `sha` is stale.
//! Requests carry the credential as a bearer token.

use crate::config::CloudConfig;
use crate::credential_manager::CredentialManager;
use crate::error::{CloudError, CloudResult};
use crate::remote_store::RemoteStore;
use crate::types::{
    decode_document, encode_document, ContentsResponse, PutContentsRequest, PutContentsResponse,
    RemoteObject, VersionToken,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use safekeep_types::{Clock, StateBlob, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const ACCEPT_JSON: &str = "application/vnd.github+json";

/// [`RemoteStore`] backed by the HTTP content API.
pub struct ContentApiClient {
    client: Client,
    config: CloudConfig,
    credentials: Arc<CredentialManager>,
    clock: Arc<dyn Clock>,
}

impl ContentApiClient {
    pub fn new(config: CloudConfig, credentials: Arc<CredentialManager>) -> CloudResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CloudError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            credentials,
            clock: Arc::new(SystemClock),
        })
    }

    /// Uses `clock` to stamp `lastUpdated` on written documents.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    fn object_url(&self) -> String {
        let location = &self.config.location;
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.config.api_base_url.trim_end_matches('/'),
            location.owner,
            location.collection,
            location.object_name.trim_start_matches('/'),
        )
    }

    /// Attaches the credential and API headers.
    async fn authorize(&self, request: RequestBuilder) -> CloudResult<RequestBuilder> {
        let credential = self
            .credentials
            .credential()
            .await
            .ok_or(CloudError::SyncDisabled)?;
        Ok(request
            .bearer_auth(credential.expose())
            .header(ACCEPT, ACCEPT_JSON))
    }

    /// Maps a non-success response onto the error taxonomy.
    async fn status_error(&self, resp: Response, method: &str, sent_version: bool) -> CloudError {
        let status = resp.status();
        let rate_limited = resp
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0");
        let body = resp.text().await.unwrap_or_default();
        debug!("{method} {} returned {status}", self.config.location.object_name);

        match status {
            StatusCode::UNAUTHORIZED => {
                self.credentials.mark_rejected();
                CloudError::Unauthorized(format!("{status}: {body}"))
            }
            StatusCode::FORBIDDEN if rate_limited => {
                CloudError::TransientNetwork(format!("rate limited: {status}"))
            }
            StatusCode::FORBIDDEN => {
                self.credentials.mark_rejected();
                CloudError::Unauthorized(format!("{status}: {body}"))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                CloudError::TransientNetwork(format!("rate limited: {status}"))
            }
            StatusCode::CONFLICT => CloudError::Conflict,
            // Creating over an existing object without naming its version.
            StatusCode::UNPROCESSABLE_ENTITY if !sent_version => CloudError::Conflict,
            s if s.is_server_error() => CloudError::TransientNetwork(format!("{status}: {body}")),
            _ => CloudError::Api(format!("{method} returned {status}: {body}")),
        }
    }

    /// Extracts the raw document bytes from a contents response, following
    /// `download_url` when the content is not inlined.
    async fn document_bytes(&self, contents: &ContentsResponse) -> CloudResult<Vec<u8>> {
        let inline = contents
            .content
            .as_deref()
            .filter(|c| !c.is_empty() && contents.encoding.as_deref() == Some("base64"));

        if let Some(encoded) = inline {
            let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
            return STANDARD
                .decode(compact)
                .map_err(|e| CloudError::Malformed(format!("invalid base64 content: {e}")));
        }

        let Some(url) = contents.download_url.as_deref() else {
            return Err(CloudError::Malformed(
                "object has neither inline content nor a download URL".to_string(),
            ));
        };

        debug!("object content not inlined, downloading");
        let resp = self.authorize(self.client.get(url)).await?.send().await?;
        if !resp.status().is_success() {
            return Err(self.status_error(resp, "GET", false).await);
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl RemoteStore for ContentApiClient {
    async fn get_object(&self) -> CloudResult<Option<RemoteObject>> {
        let request = self
            .client
            .get(self.object_url())
            .query(&[("ref", self.config.branch.as_str())]);
        let resp = self.authorize(request).await?.send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!("remote object {} does not exist", self.config.location.object_name);
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(self.status_error(resp, "GET", false).await);
        }

        let contents: ContentsResponse = resp
            .json()
            .await
            .map_err(|e| CloudError::Malformed(e.to_string()))?;
        let bytes = self.document_bytes(&contents).await?;
        let (payload, updated_at) = decode_document(&bytes)?;

        Ok(Some(RemoteObject {
            version: VersionToken::new(contents.sha),
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
        debug!("writing {} bytes to remote object", document.len());

        let body = PutContentsRequest {
            message: &self.config.commit_message,
            content: STANDARD.encode(&document),
            branch: &self.config.branch,
            sha: expected_version.map(VersionToken::as_str),
        };

        let request = self.client.put(self.object_url()).json(&body);
        let resp = self.authorize(request).await?.send().await?;

        if !resp.status().is_success() {
            return Err(self
                .status_error(resp, "PUT", expected_version.is_some())
                .await);
        }

        let written: PutContentsResponse = resp
            .json()
            .await
            .map_err(|e| CloudError::Malformed(e.to_string()))?;
        Ok(VersionToken::new(written.content.sha))
    }
}
