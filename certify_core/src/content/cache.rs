// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::types::ContentId;

/// Bounded cache of resolved blobs.
///
/// Content addressing makes every entry immutable, so entries never go
/// stale; the only policy is the capacity bound.
pub struct ContentCache {
    entries: DashMap<ContentId, Arc<Vec<u8>>>,
    capacity: usize,
}

impl ContentCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, cid: &ContentId) -> Option<Arc<Vec<u8>>> {
        self.entries.get(cid).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, cid: ContentId, bytes: Vec<u8>) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&cid) {
            // Evict an arbitrary entry; any blob can be re-fetched
            let victim = self.entries.iter().next().map(|entry| entry.key().clone());
            if let Some(victim) = victim {
                debug!("Evicting {} from content cache", victim);
                self.entries.remove(&victim);
            }
        }
        self.entries.insert(cid, Arc::new(bytes));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_bound() {
        let cache = ContentCache::new(2);
        for name in ["QmA", "QmB", "QmC"] {
            cache.insert(ContentId::parse(name).unwrap(), name.as_bytes().to_vec());
        }

        assert_eq!(cache.len(), 2);
        let c = ContentId::parse("QmC").unwrap();
        assert_eq!(cache.get(&c).unwrap().as_slice(), b"QmC");
    }
}
