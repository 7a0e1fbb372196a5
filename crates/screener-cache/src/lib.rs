//! TTL-keyed response cache for the fetch layer, with interchangeable backends.

mod backends;
mod ttl;

pub use backends::{FileCacheBackend, InMemoryCacheBackend, SqliteCacheBackend};
pub use ttl::ttl_for_url;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Storage contract a cache backend must satisfy. Failures are the backend's
/// own business — `Cache` never sees a `Result` here, only an `Option`/unit,
/// so a broken backend degrades to always-miss rather than failing a fetch.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, payload: &[u8], ttl: Duration);
    async fn clear(&self);
}

/// Lowercase hex SHA-256 of the full URL, used as the cache key and (for the
/// file backend) the filename stem.
pub fn fingerprint(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Facade combining a backend with the endpoint-derived TTL table. The only
/// type most callers touch.
pub struct Cache<B: CacheBackend> {
    backend: Arc<B>,
}

impl<B: CacheBackend> Cache<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// `None` on miss or expiry. Backend errors are swallowed by the
    /// backend itself and surface here as a plain miss.
    pub async fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.backend.get(&fingerprint(url)).await
    }

    /// Never stores an empty payload; ttl is derived from the URL unless
    /// `ttl_override` is given.
    pub async fn set(&self, url: &str, payload: &[u8], ttl_override: Option<Duration>) {
        if payload.is_empty() {
            return;
        }
        let ttl = ttl_override.unwrap_or_else(|| ttl_for_url(url));
        self.backend.set(&fingerprint(url), payload, ttl).await;
    }

    pub async fn clear(&self) {
        self.backend.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic_and_distinct() {
        let a = fingerprint("https://example.com/a");
        let b = fingerprint("https://example.com/a");
        let c = fingerprint("https://example.com/b");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn in_memory_round_trip() {
        let cache = Cache::new(Arc::new(InMemoryCacheBackend::new()));
        cache.set("https://api/profile/AAPL", b"payload", None).await;
        assert_eq!(cache.get("https://api/profile/AAPL").await, Some(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn empty_payload_is_never_stored() {
        let cache = Cache::new(Arc::new(InMemoryCacheBackend::new()));
        cache.set("https://api/quote/AAPL", b"", None).await;
        assert_eq!(cache.get("https://api/quote/AAPL").await, None);
    }

    #[tokio::test]
    async fn clear_drops_all_entries() {
        let cache = Cache::new(Arc::new(InMemoryCacheBackend::new()));
        cache.set("https://api/x", b"1", None).await;
        cache.clear().await;
        assert_eq!(cache.get("https://api/x").await, None);
    }
}
