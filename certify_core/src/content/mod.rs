// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

//! Content-addressed storage: gateways for reads, one authoritative store
//! for writes, and the resolver that falls back across gateways

pub mod cache;
pub mod gateway;
pub mod memory;
pub mod resolver;
pub mod store;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::ContentId;

pub use cache::ContentCache;
pub use gateway::HttpGateway;
pub use memory::MemoryContentStore;
pub use resolver::{ContentResolver, RetryPolicy};
pub use store::IpfsApiStore;

/// Error types for content resolution and upload
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Invalid content identifier: {0}")]
    InvalidContentId(String),

    #[error("Gateway {gateway} failed: {reason}")]
    GatewayFailed { gateway: String, reason: String },

    #[error("Gateway {gateway} timed out after {timeout_ms}ms")]
    Timeout { gateway: String, timeout_ms: u64 },

    #[error("Resolution failed for {cid} after {attempts} attempts: {last_error}")]
    ResolutionFailed {
        cid: String,
        attempts: usize,
        last_error: String,
    },

    #[error("Malformed content at {cid}: {reason}")]
    Malformed { cid: String, reason: String },

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ResolverError {
    /// True for read-path failures that callers degrade to missing metadata
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            ResolverError::ResolutionFailed { .. }
                | ResolverError::Malformed { .. }
                | ResolverError::InvalidContentId(_)
        )
    }
}

/// A read endpoint able to serve blobs by content identifier
#[async_trait]
pub trait ContentGateway: Send + Sync {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// Fetch the blob named by `cid`
    async fn fetch(&self, cid: &ContentId) -> Result<Vec<u8>, ResolverError>;

    /// Check whether the gateway currently answers requests
    async fn is_available(&self) -> bool;
}

/// The single authoritative store that accepts uploads
#[async_trait]
pub trait ContentStore: Send + Sync {
    fn name(&self) -> &str;

    /// Upload a blob and return its content identifier
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentId, ResolverError>;
}
