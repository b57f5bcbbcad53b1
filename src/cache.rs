//! Cache invalidation layer
//!
//! Derived read models (tag listing, top-rated proposals) are cached with a
//! fixed TTL and invalidated unconditionally on any mutation that could
//! affect them. Correctness over hit rate.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Key-value cache with TTL support
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn set(&self, key: &str, value: Value, ttl: Duration);
    async fn forget(&self, key: &str);
    async fn forget_prefix(&self, prefix: &str);
}

/// In-memory cache with per-entry expiry
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (Value, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Some(value.clone()),
            _ => None,
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value, Instant::now() + ttl));
    }

    async fn forget(&self, key: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(key);
    }

    async fn forget_prefix(&self, prefix: &str) {
        let mut entries = self.entries.write().await;
        entries.retain(|k, _| !k.starts_with(prefix));
    }
}

/// Cache key builders and invalidation helpers for the proposal domain
#[derive(Clone)]
pub struct CacheLayer {
    cache: Arc<dyn Cache>,
}

impl CacheLayer {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    pub fn proposal_key(id: Uuid) -> String {
        format!("proposals:{}", id)
    }

    pub fn user_proposals_key(user_id: Uuid) -> String {
        format!("users:{}:proposals", user_id)
    }

    pub fn tags_key() -> String {
        "tags:all".to_string()
    }

    pub fn top_rated_key(limit: usize) -> String {
        format!("proposals:top-rated:{}", limit)
    }

    /// Forget the proposal-specific entry plus every top-rated entry.
    /// Membership or ratings may have changed for any limit.
    pub async fn forget_proposal_related(&self, proposal_id: Uuid) {
        self.cache.forget(&Self::proposal_key(proposal_id)).await;
        self.cache.forget_prefix("proposals:top-rated:").await;
    }

    pub async fn forget_user_related(&self, user_id: Uuid) {
        self.cache
            .forget_prefix(&format!("users:{}:", user_id))
            .await;
    }

    pub async fn forget_tags(&self) {
        self.cache.forget(&Self::tags_key()).await;
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.cache.get(key).await
    }

    pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
        self.cache.set(key, value, ttl).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer() -> CacheLayer {
        CacheLayer::new(Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn test_set_get_forget() {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await, Some(json!(1)));

        cache.forget("k").await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss() {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), Duration::from_millis(0)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_proposal_invalidation_clears_all_top_rated_limits() {
        let layer = layer();
        let id = Uuid::new_v4();
        layer
            .set(&CacheLayer::top_rated_key(5), json!([1]), Duration::from_secs(60))
            .await;
        layer
            .set(&CacheLayer::top_rated_key(10), json!([2]), Duration::from_secs(60))
            .await;
        layer
            .set(&CacheLayer::proposal_key(id), json!("p"), Duration::from_secs(60))
            .await;

        layer.forget_proposal_related(id).await;

        assert!(layer.get(&CacheLayer::top_rated_key(5)).await.is_none());
        assert!(layer.get(&CacheLayer::top_rated_key(10)).await.is_none());
        assert!(layer.get(&CacheLayer::proposal_key(id)).await.is_none());
    }

    #[tokio::test]
    async fn test_user_invalidation_scoped_to_user() {
        let layer = layer();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        layer
            .set(&CacheLayer::user_proposals_key(user_a), json!([]), Duration::from_secs(60))
            .await;
        layer
            .set(&CacheLayer::user_proposals_key(user_b), json!([]), Duration::from_secs(60))
            .await;

        layer.forget_user_related(user_a).await;

        assert!(layer.get(&CacheLayer::user_proposals_key(user_a)).await.is_none());
        assert!(layer.get(&CacheLayer::user_proposals_key(user_b)).await.is_some());
    }
}
