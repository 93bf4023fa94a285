// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::content::{ContentStore, ResolverError};
use crate::types::ContentId;

/// Authoritative upload store speaking the IPFS HTTP API (`/api/v0/add`).
///
/// Pinning services that front the same API accept a bearer token.
pub struct IpfsApiStore {
    api_endpoint: String,
    client: reqwest::Client,
    auth_token: Option<String>,
}

#[derive(Deserialize)]
struct IpfsAddResponse {
    #[serde(rename = "Hash", default)]
    hash: String,
}

impl IpfsApiStore {
    pub fn new(api_endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ResolverError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolverError::UploadFailed(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_endpoint: api_endpoint.into().trim_end_matches('/').to_string(),
            client,
            auth_token: None,
        })
    }

    /// Attach a bearer token sent with every upload
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.auth_token = if token.is_empty() { None } else { Some(token) };
        self
    }
}

#[async_trait]
impl ContentStore for IpfsApiStore {
    fn name(&self) -> &str {
        &self.api_endpoint
    }

    async fn put(&self, bytes: Vec<u8>) -> Result<ContentId, ResolverError> {
        let url = format!("{}/api/v0/add?pin=true", self.api_endpoint);
        let size = bytes.len();

        let part = reqwest::multipart::Part::bytes(bytes).file_name("blob");
        let form = reqwest::multipart::Form::new().part("file", part);

        let mut request = self.client.post(&url).multipart(form);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ResolverError::UploadFailed(format!("network error: {}", e)))?;

        if !response.status().is_success() {
            return Err(ResolverError::UploadFailed(format!(
                "IPFS API returned status: {}",
                response.status()
            )));
        }

        let added = response
            .json::<IpfsAddResponse>()
            .await
            .map_err(|e| ResolverError::UploadFailed(format!("failed to parse IPFS response: {}", e)))?;

        let cid = ContentId::parse(&added.hash).ok_or_else(|| {
            ResolverError::UploadFailed("store returned no content identifier".to_string())
        })?;

        debug!("Uploaded {} bytes to {}", size, self.api_endpoint);
        info!("Stored content {} at {}", cid, self.api_endpoint);
        Ok(cid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_put_returns_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/add"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Name": "blob",
                "Hash": "QmUploaded",
                "Size": "5"
            })))
            .mount(&server)
            .await;

        let store = IpfsApiStore::new(server.uri(), Duration::from_secs(2))
            .unwrap()
            .with_auth_token("secret");

        let cid = store.put(b"hello".to_vec()).await.unwrap();
        assert_eq!(cid.as_str(), "QmUploaded");
    }

    #[tokio::test]
    async fn test_put_without_identifier_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/add"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "Name": "blob" })))
            .mount(&server)
            .await;

        let store = IpfsApiStore::new(server.uri(), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            store.put(b"hello".to_vec()).await,
            Err(ResolverError::UploadFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_put_rejected_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = IpfsApiStore::new(server.uri(), Duration::from_secs(2)).unwrap();
        match store.put(b"hello".to_vec()).await {
            Err(ResolverError::UploadFailed(reason)) => assert!(reason.contains("401")),
            other => panic!("expected upload failure, got {:?}", other),
        }
    }
}
