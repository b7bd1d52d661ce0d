use serde::{Deserialize, Serialize};

use newhealth_core::PharmacyData;

use crate::kv::KeyValueStoreRef;

/// Logical key holding the cached business content.
pub const CONTENT_CACHE_KEY: &str = "nh_pharmacy_content_cache";

/// Cache lifetime: consumers treat the payload as stale after 24 hours.
pub const CACHE_EXPIRY_MS: u64 = 24 * 60 * 60 * 1000;

/// Cached payload with its fetch timestamp. The store applies no TTL of its
/// own; staleness is checked by the reader against the clock it is handed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedContent {
    pub payload: PharmacyData,
    pub fetched_at_ms: u64,
}

/// Reader/writer for the timed content cache.
#[derive(Debug, Clone)]
pub struct ContentCache {
    store: KeyValueStoreRef,
}

impl ContentCache {
    pub fn new(store: KeyValueStoreRef) -> Self {
        Self { store }
    }

    /// Return the cached payload when fetched within the expiry window of
    /// `now_ms`. A missing, unparsable, or stale entry yields `None`.
    pub async fn get_fresh(&self, now_ms: u64) -> Option<PharmacyData> {
        let raw = match self.store.get(CONTENT_CACHE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("content cache read failed: {}", e);
                return None;
            }
        };

        let cached: CachedContent = match serde_json::from_str(&raw) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!("content cache parsing failed, fetching fresh content: {}", e);
                return None;
            }
        };

        if now_ms.saturating_sub(cached.fetched_at_ms) < CACHE_EXPIRY_MS {
            Some(cached.payload)
        } else {
            None
        }
    }

    /// Store a freshly fetched payload stamped with `now_ms`.
    pub async fn put(&self, payload: PharmacyData, now_ms: u64) {
        let entry = CachedContent {
            payload,
            fetched_at_ms: now_ms,
        };
        let serialized = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("failed to serialize content cache entry: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.put(CONTENT_CACHE_KEY, serialized).await {
            tracing::warn!("failed to persist content cache entry: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use newhealth_core::fallback_content;
    use std::sync::Arc;

    #[tokio::test]
    async fn empty_cache_misses() {
        let cache = ContentCache::new(Arc::new(MemoryStore::new()));
        assert!(cache.get_fresh(0).await.is_none());
    }

    #[tokio::test]
    async fn fresh_entry_hits_within_window() {
        let cache = ContentCache::new(Arc::new(MemoryStore::new()));
        let payload = fallback_content();
        cache.put(payload.clone(), 1_000).await;

        let hit = cache.get_fresh(1_000 + CACHE_EXPIRY_MS - 1).await;
        assert_eq!(hit, Some(payload));
    }

    #[tokio::test]
    async fn stale_entry_misses_after_window() {
        let cache = ContentCache::new(Arc::new(MemoryStore::new()));
        cache.put(fallback_content(), 1_000).await;

        assert!(cache.get_fresh(1_000 + CACHE_EXPIRY_MS).await.is_none());
    }

    #[tokio::test]
    async fn unparsable_entry_misses() {
        let store: KeyValueStoreRef = Arc::new(MemoryStore::new());
        store
            .put(CONTENT_CACHE_KEY, "garbage".to_string())
            .await
            .unwrap();
        let cache = ContentCache::new(store);
        assert!(cache.get_fresh(0).await.is_none());
    }

    #[tokio::test]
    async fn clock_behind_timestamp_still_hits() {
        // A clock that moved backwards should not panic or miss
        let cache = ContentCache::new(Arc::new(MemoryStore::new()));
        cache.put(fallback_content(), 5_000).await;
        assert!(cache.get_fresh(4_000).await.is_some());
    }
}
