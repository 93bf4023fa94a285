// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::content::{ContentGateway, ResolverError};
use crate::types::ContentId;

/// Read-only HTTP gateway serving `GET <base>/ipfs/<cid>`
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Create a gateway whose requests are bounded by `timeout`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ResolverError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolverError::GatewayFailed {
                gateway: "http".to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self::with_client(base_url, client))
    }

    /// Create a gateway sharing an existing HTTP client
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    fn url_for(&self, cid: &ContentId) -> String {
        format!("{}/ipfs/{}", self.base_url, cid)
    }
}

#[async_trait]
impl ContentGateway for HttpGateway {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, cid: &ContentId) -> Result<Vec<u8>, ResolverError> {
        let url = self.url_for(cid);
        debug!("Fetching {} from {}", cid, url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            ResolverError::GatewayFailed {
                gateway: self.base_url.clone(),
                reason,
            }
        })?;

        if !response.status().is_success() {
            return Err(ResolverError::GatewayFailed {
                gateway: self.base_url.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ResolverError::GatewayFailed {
                gateway: self.base_url.clone(),
                reason: format!("failed to read body: {}", e),
            })?;

        Ok(bytes.to_vec())
    }

    async fn is_available(&self) -> bool {
        // Any answer below 500 means the gateway is up, even a 404 for the root
        match self.client.head(format!("{}/ipfs/", self.base_url)).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_success_and_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ipfs/QmGood"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ipfs/QmBad"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(format!("{}/", server.uri()), Duration::from_secs(2)).unwrap();
        assert_eq!(gateway.name(), server.uri());

        let good = ContentId::parse("QmGood").unwrap();
        assert_eq!(gateway.fetch(&good).await.unwrap(), b"hello".to_vec());

        let bad = ContentId::parse("QmBad").unwrap();
        match gateway.fetch(&bad).await {
            Err(ResolverError::GatewayFailed { reason, .. }) => assert!(reason.contains("502")),
            other => panic!("expected gateway failure, got {:?}", other),
        }
    }
}
