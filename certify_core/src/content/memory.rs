// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::content::{ContentGateway, ContentStore, ResolverError};
use crate::types::ContentId;

/// Multibase/CIDv1 prefix: base16, version 1, raw codec, sha2-256, 32 bytes
const CID_V1_RAW_SHA256_PREFIX: &str = "f01551220";

/// Compute the CIDv1 (raw, sha2-256, base16) identifier of a blob
pub fn content_id_for(bytes: &[u8]) -> ContentId {
    let digest = Sha256::digest(bytes);
    ContentId::from_canonical(format!("{}{}", CID_V1_RAW_SHA256_PREFIX, hex::encode(digest)))
}

/// In-process content store that is both an upload store and a gateway.
///
/// Backs the CLI sandbox and the test suite. Faults can be switched on to
/// simulate an offline gateway or a store that refuses uploads.
pub struct MemoryContentStore {
    name: String,
    blobs: RwLock<HashMap<ContentId, Vec<u8>>>,
    offline: AtomicBool,
    reject_uploads: AtomicBool,
    fetches: AtomicUsize,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blobs: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
            reject_uploads: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Rebuild a store from exported blobs
    pub fn from_blobs(name: impl Into<String>, blobs: BTreeMap<String, Vec<u8>>) -> Self {
        let store = Self::named(name);
        {
            let mut guard = store.blobs.write();
            for (cid, bytes) in blobs {
                if let Some(cid) = ContentId::parse(&cid) {
                    guard.insert(cid, bytes);
                }
            }
        }
        store
    }

    /// Export all blobs keyed by identifier
    pub fn export(&self) -> BTreeMap<String, Vec<u8>> {
        self.blobs
            .read()
            .iter()
            .map(|(cid, bytes)| (cid.to_string(), bytes.clone()))
            .collect()
    }

    /// Store a blob under an explicit identifier, bypassing hashing
    pub fn insert_raw(&self, cid: ContentId, bytes: Vec<u8>) {
        self.blobs.write().insert(cid, bytes);
    }

    pub fn contains(&self, cid: &ContentId) -> bool {
        self.blobs.read().contains_key(cid)
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Make every fetch fail as if the gateway were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make every upload fail
    pub fn set_reject_uploads(&self, reject: bool) {
        self.reject_uploads.store(reject, Ordering::SeqCst);
    }

    /// Number of fetches served or attempted so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, bytes: Vec<u8>) -> Result<ContentId, ResolverError> {
        if self.reject_uploads.load(Ordering::SeqCst) {
            return Err(ResolverError::UploadFailed(format!("{} rejected the upload", self.name)));
        }

        let cid = content_id_for(&bytes);
        self.blobs.write().insert(cid.clone(), bytes);
        Ok(cid)
    }
}

#[async_trait]
impl ContentGateway for MemoryContentStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, cid: &ContentId) -> Result<Vec<u8>, ResolverError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(ResolverError::GatewayFailed {
                gateway: self.name.clone(),
                reason: "gateway offline".to_string(),
            });
        }

        self.blobs
            .read()
            .get(cid)
            .cloned()
            .ok_or_else(|| ResolverError::GatewayFailed {
                gateway: self.name.clone(),
                reason: format!("HTTP 404 Not Found for {}", cid),
            })
    }

    async fn is_available(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_is_deterministic() {
        let a = content_id_for(b"same bytes");
        let b = content_id_for(b"same bytes");
        let c = content_id_for(b"other bytes");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with(CID_V1_RAW_SHA256_PREFIX));
        assert_eq!(a.as_str().len(), CID_V1_RAW_SHA256_PREFIX.len() + 64);
    }

    #[tokio::test]
    async fn test_put_fetch_and_export() {
        let store = MemoryContentStore::named("primary");
        let cid = store.put(b"payload".to_vec()).await.unwrap();

        assert_eq!(store.fetch(&cid).await.unwrap(), b"payload".to_vec());
        assert_eq!(store.fetch_count(), 1);

        let restored = MemoryContentStore::from_blobs("copy", store.export());
        assert!(restored.contains(&cid));
        assert_eq!(restored.len(), 1);
    }

    #[tokio::test]
    async fn test_faults() {
        let store = MemoryContentStore::new();
        let cid = store.put(b"payload".to_vec()).await.unwrap();

        store.set_offline(true);
        assert!(store.fetch(&cid).await.is_err());
        assert!(!store.is_available().await);

        store.set_reject_uploads(true);
        assert!(matches!(
            store.put(b"more".to_vec()).await,
            Err(ResolverError::UploadFailed(_))
        ));
    }
}
