// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.


use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::ContentConfig;
use crate::content::{
    ContentCache, ContentGateway, ContentStore, HttpGateway, IpfsApiStore, ResolverError,
};
use crate::types::{ContentId, ProfileMetadata, Role};

/// Retry policy applied to each gateway before falling through to the next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Extra attempts on the same gateway after the first failure
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 200,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Single attempt per gateway
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Backoff before retry number `attempt` (0-based), with up to 10% jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        let jitter = if delay >= 10 {
            rand::thread_rng().gen_range(0..=delay / 10)
        } else {
            0
        };
        Duration::from_millis(delay + jitter)
    }
}

/// Resolves content identifiers across an ordered list of gateways and
/// uploads to a single authoritative store.
///
/// Reads try gateway 0 first, retry it per the [`RetryPolicy`], then fall
/// through to gateway 1 and so on. Every attempt is bounded by
/// `attempt_timeout`, so a hung gateway cannot block fallback. Writes have
/// no fallback: the identifier must come from the store the ledger will
/// point to.
pub struct ContentResolver {
    gateways: Vec<Arc<dyn ContentGateway>>,
    store: Arc<dyn ContentStore>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
    cache: Option<ContentCache>,
}

impl ContentResolver {
    pub fn new(gateways: Vec<Arc<dyn ContentGateway>>, store: Arc<dyn ContentStore>) -> Self {
        Self {
            gateways,
            store,
            retry: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(10),
            cache: None,
        }
    }

    /// Build HTTP gateways and the IPFS API store from configuration
    pub fn from_config(config: &ContentConfig) -> Result<Self, ResolverError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);

        let mut gateways: Vec<Arc<dyn ContentGateway>> = Vec::with_capacity(config.gateways.len());
        for url in &config.gateways {
            gateways.push(Arc::new(HttpGateway::new(url.clone(), timeout)?));
        }

        let store = IpfsApiStore::new(config.upload_endpoint.clone(), timeout)?
            .with_auth_token(config.upload_token.clone());

        Ok(Self::new(gateways, Arc::new(store))
            .with_retry_policy(config.retry.clone())
            .with_attempt_timeout(timeout)
            .with_cache(config.cache_capacity))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Enable a bounded cache of fetched blobs; 0 disables caching
    pub fn with_cache(mut self, capacity: usize) -> Self {
        self.cache = if capacity == 0 {
            None
        } else {
            Some(ContentCache::new(capacity))
        };
        self
    }

    pub fn gateway_names(&self) -> Vec<String> {
        self.gateways.iter().map(|g| g.name().to_string()).collect()
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.as_ref().map_or(0, ContentCache::len)
    }

    /// Fetch a blob, falling back across gateways
    pub async fn get(&self, reference: &str) -> Result<Vec<u8>, ResolverError> {
        let cid = ContentId::parse(reference)
            .ok_or_else(|| ResolverError::InvalidContentId(reference.to_string()))?;

        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(&cid)) {
            debug!("Content cache hit for {}", cid);
            return Ok(cached.as_ref().clone());
        }

        let mut attempts = 0usize;
        let mut last_error = String::from("no gateways configured");

        for gateway in &self.gateways {
            match self.fetch_from(gateway.as_ref(), &cid, &mut attempts).await {
                Ok(bytes) => {
                    if let Some(cache) = &self.cache {
                        cache.insert(cid.clone(), bytes.clone());
                    }
                    return Ok(bytes);
                }
                Err(e) => {
                    warn!("Gateway {} could not serve {}: {}. Trying next gateway...", gateway.name(), cid, e);
                    last_error = e.to_string();
                }
            }
        }

        error!("All gateways failed to resolve {} ({} attempts)", cid, attempts);
        Err(ResolverError::ResolutionFailed {
            cid: cid.to_string(),
            attempts,
            last_error,
        })
    }

    /// Fetch and parse a JSON document
    pub async fn get_json<T: DeserializeOwned>(&self, reference: &str) -> Result<T, ResolverError> {
        let bytes = self.get(reference).await?;
        serde_json::from_slice(&bytes).map_err(|e| ResolverError::Malformed {
            cid: reference.to_string(),
            reason: e.to_string(),
        })
    }

    /// Fetch a profile document and parse it as the shape of `role`
    pub async fn get_profile(&self, reference: &str, role: Role) -> Result<ProfileMetadata, ResolverError> {
        let document = self.get_json::<serde_json::Value>(reference).await?;
        ProfileMetadata::from_document(role, document).map_err(|reason| ResolverError::Malformed {
            cid: reference.to_string(),
            reason,
        })
    }

    /// Upload a blob to the authoritative store
    pub async fn put(&self, bytes: Vec<u8>) -> Result<ContentId, ResolverError> {
        let size = bytes.len();
        let cid = self.store.put(bytes).await.map_err(|e| match e {
            ResolverError::UploadFailed(reason) => ResolverError::UploadFailed(reason),
            other => ResolverError::UploadFailed(other.to_string()),
        })?;

        info!("Uploaded {} bytes to {} as {}", size, self.store.name(), cid);
        Ok(cid)
    }

    /// Serialize `value` once and upload exactly those bytes
    pub async fn put_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<ContentId, ResolverError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| ResolverError::SerializationError(e.to_string()))?;
        self.put(bytes).await
    }

    /// True if at least one gateway answers
    pub async fn is_available(&self) -> bool {
        for gateway in &self.gateways {
            if gateway.is_available().await {
                return true;
            }
        }
        false
    }

    async fn fetch_from(
        &self,
        gateway: &dyn ContentGateway,
        cid: &ContentId,
        attempts: &mut usize,
    ) -> Result<Vec<u8>, ResolverError> {
        let mut attempt = 0u32;
        loop {
            *attempts += 1;
            let outcome = match tokio::time::timeout(self.attempt_timeout, gateway.fetch(cid)).await {
                Ok(result) => result,
                Err(_) => Err(ResolverError::Timeout {
                    gateway: gateway.name().to_string(),
                    timeout_ms: self.attempt_timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(bytes) => {
                    debug!("Resolved {} via {} on attempt {}", cid, gateway.name(), attempt + 1);
                    return Ok(bytes);
                }
                Err(e) if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    debug!(
                        "Retry #{} for {} on {} after {}ms: {}",
                        attempt + 1,
                        cid,
                        gateway.name(),
                        delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MemoryContentStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver_over(store: Arc<MemoryContentStore>) -> ContentResolver {
        let gateways: Vec<Arc<dyn ContentGateway>> = vec![store.clone()];
        ContentResolver::new(gateways, store)
            .with_retry_policy(RetryPolicy::none())
            .with_attempt_timeout(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_falls_back_after_server_error() {
        let primary = MockServer::start().await;
        let fallback = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ipfs/QmProfile"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&primary)
            .await;
        Mock::given(method("GET"))
            .and(path("/ipfs/QmProfile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "role": "student",
                "name": "Ada",
                "email": "ada@example.org",
                "studentId": "S100"
            })))
            .expect(1)
            .mount(&fallback)
            .await;

        let timeout = Duration::from_secs(2);
        let gateways: Vec<Arc<dyn ContentGateway>> = vec![
            Arc::new(HttpGateway::new(primary.uri(), timeout).unwrap()),
            Arc::new(HttpGateway::new(fallback.uri(), timeout).unwrap()),
        ];
        let resolver = ContentResolver::new(gateways, Arc::new(MemoryContentStore::new()))
            .with_retry_policy(RetryPolicy::none());

        let profile = resolver.get_profile("ipfs://QmProfile", Role::Student).await.unwrap();
        assert_eq!(profile.student_id(), Some("S100"));
    }

    #[tokio::test]
    async fn test_hung_gateway_does_not_block_fallback() {
        let hung = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&hung)
            .await;

        let backup = Arc::new(MemoryContentStore::named("backup"));
        let cid = backup.put(b"payload".to_vec()).await.unwrap();

        let gateways: Vec<Arc<dyn ContentGateway>> = vec![
            Arc::new(HttpGateway::new(hung.uri(), Duration::from_secs(60)).unwrap()),
            backup.clone(),
        ];
        let resolver = ContentResolver::new(gateways, backup.clone())
            .with_retry_policy(RetryPolicy::none())
            .with_attempt_timeout(Duration::from_millis(200));

        let started = std::time::Instant::now();
        let bytes = resolver.get(cid.as_str()).await.unwrap();
        assert_eq!(bytes, b"payload".to_vec());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_all_gateways_exhausted() {
        let first = Arc::new(MemoryContentStore::named("first"));
        let second = Arc::new(MemoryContentStore::named("second"));
        first.set_offline(true);

        let gateways: Vec<Arc<dyn ContentGateway>> = vec![first.clone(), second.clone()];
        let resolver = ContentResolver::new(gateways, second.clone())
            .with_retry_policy(RetryPolicy {
                max_retries: 2,
                base_delay_ms: 1,
                max_delay_ms: 5,
            });

        match resolver.get("QmMissing").await {
            Err(ResolverError::ResolutionFailed { attempts, .. }) => assert_eq!(attempts, 6),
            other => panic!("expected resolution failure, got {:?}", other),
        }
        assert_eq!(first.fetch_count(), 3);
        assert_eq!(second.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_retry_recovers_on_same_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ipfs/QmFlaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ipfs/QmFlaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let gateways: Vec<Arc<dyn ContentGateway>> =
            vec![Arc::new(HttpGateway::new(server.uri(), Duration::from_secs(2)).unwrap())];
        let resolver = ContentResolver::new(gateways, Arc::new(MemoryContentStore::new()))
            .with_retry_policy(RetryPolicy {
                max_retries: 1,
                base_delay_ms: 5,
                max_delay_ms: 10,
            });

        assert_eq!(resolver.get("QmFlaky").await.unwrap(), b"ok".to_vec());
    }

    #[tokio::test]
    async fn test_put_json_round_trips_bytes() {
        let store = Arc::new(MemoryContentStore::new());
        let resolver = resolver_over(store.clone());

        let document = serde_json::json!({ "b": 2, "a": [1, 2, 3] });
        let cid = resolver.put_json(&document).await.unwrap();

        let fetched = resolver.get(&cid.to_uri()).await.unwrap();
        assert_eq!(fetched, serde_json::to_vec(&document).unwrap());
    }

    #[tokio::test]
    async fn test_malformed_json_is_resolution_failure() {
        let store = Arc::new(MemoryContentStore::new());
        let resolver = resolver_over(store.clone());

        let cid = resolver.put(b"{not json".to_vec()).await.unwrap();
        let err = resolver.get_profile(cid.as_str(), Role::Student).await.unwrap_err();
        assert!(matches!(err, ResolverError::Malformed { .. }));
        assert!(err.is_resolution_failure());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_gateways() {
        let store = Arc::new(MemoryContentStore::new());
        let cid = store.put(b"cached".to_vec()).await.unwrap();
        let resolver = resolver_over(store.clone()).with_cache(8);

        resolver.get(cid.as_str()).await.unwrap();
        store.set_offline(true);
        assert_eq!(resolver.get(cid.as_str()).await.unwrap(), b"cached".to_vec());
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(resolver.cached_entries(), 1);
    }

    #[tokio::test]
    async fn test_upload_failure_is_fatal() {
        let store = Arc::new(MemoryContentStore::new());
        store.set_reject_uploads(true);
        let resolver = resolver_over(store.clone());

        assert!(matches!(
            resolver.put(b"x".to_vec()).await,
            Err(ResolverError::UploadFailed(_))
        ));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        };
        assert!(policy.delay_for(0) >= Duration::from_millis(100));
        assert!(policy.delay_for(0) <= Duration::from_millis(110));
        assert!(policy.delay_for(9) <= Duration::from_millis(1_100));
        assert!(policy.delay_for(63) <= Duration::from_millis(1_100));
    }
}
