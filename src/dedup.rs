//! Content-hash deduplication
//!
//! Prevents duplicate articles within a rolling window using:
//! - SHA-256 content hash over normalized title and text
//! - Redis SET-IF-ABSENT with per-entry TTL for cross-worker dedup
//! - A bounded in-process cache as hot path and Redis-outage fallback

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Computes the canonical dedup hash for an article.
///
/// SHA-256 over the lowercased, trimmed title concatenated with the
/// lowercased, trimmed text, hex-encoded. Stable across re-ingestion.
pub fn content_hash(title: &str, text: &str) -> String {
    let combined = format!(
        "{}{}",
        title.trim().to_lowercase(),
        text.trim().to_lowercase()
    );
    let mut hasher = Sha256::new();
    hasher.update(combined.as_bytes());
    hex::encode(hasher.finalize())
}

const DEDUP_KEY_PREFIX: &str = "article_hash:";

/// Distributed dedup store with an in-process cache
pub struct DedupStore {
    /// Recently seen hashes, cleared wholesale on overflow
    seen: Arc<RwLock<HashSet<String>>>,
    /// Maximum local entries before the cache is dropped
    max_entries: usize,
    /// Redis connection for cross-worker dedup (optional)
    redis: Option<redis::aio::ConnectionManager>,
    /// TTL for Redis entries (seconds) — the dedup window
    ttl_seconds: u64,
}

impl DedupStore {
    /// Creates an in-memory-only dedup store
    pub fn new(max_entries: usize, ttl_seconds: u64) -> Self {
        Self {
            seen: Arc::new(RwLock::new(HashSet::with_capacity(max_entries.min(1024)))),
            max_entries,
            redis: None,
            ttl_seconds,
        }
    }

    /// Creates a dedup store backed by Redis
    pub fn with_redis(
        max_entries: usize,
        ttl_seconds: u64,
        redis: redis::aio::ConnectionManager,
    ) -> Self {
        Self {
            seen: Arc::new(RwLock::new(HashSet::with_capacity(max_entries.min(1024)))),
            max_entries,
            redis: Some(redis),
            ttl_seconds,
        }
    }

    /// Connects to Redis, falling back to local-only mode on failure
    pub async fn connect(max_entries: usize, ttl_seconds: u64, redis_url: &str) -> Self {
        match redis::Client::open(redis_url) {
            Ok(client) => match redis::aio::ConnectionManager::new(client).await {
                Ok(conn) => {
                    info!(url = %redis_url, "Connected to Redis for deduplication");
                    Self::with_redis(max_entries, ttl_seconds, conn)
                }
                Err(e) => {
                    warn!(error = %e, "Redis connection failed, using local cache only");
                    Self::new(max_entries, ttl_seconds)
                }
            },
            Err(e) => {
                warn!(error = %e, "Invalid Redis URL, using local cache only");
                Self::new(max_entries, ttl_seconds)
            }
        }
    }

    /// Checks whether the hash was already seen within the window and marks
    /// it as seen. Returns true for duplicates.
    ///
    /// The Redis operation is a single SET-IF-ABSENT with expiry; a Redis
    /// failure degrades to the in-process cache without blocking.
    pub async fn check_and_mark(&self, hash: &str) -> bool {
        if self.seen_locally(hash) {
            debug!(hash = %hash, "Duplicate found in local cache");
            return true;
        }

        if let Some(ref redis) = self.redis {
            match self.set_if_absent(hash, redis.clone()).await {
                Ok(existed) => {
                    self.mark_locally(hash);
                    if existed {
                        debug!(hash = %hash, "Duplicate found in Redis");
                    }
                    return existed;
                }
                Err(e) => {
                    warn!(error = %e, "Redis check failed, falling back to local cache");
                }
            }
        }

        self.mark_locally(hash);
        false
    }

    fn seen_locally(&self, hash: &str) -> bool {
        self.seen.read().contains(hash)
    }

    fn mark_locally(&self, hash: &str) {
        let mut seen = self.seen.write();

        if seen.len() >= self.max_entries {
            debug!(
                entries = seen.len(),
                max = self.max_entries,
                "Clearing local dedup cache"
            );
            seen.clear();
        }

        seen.insert(hash.to_string());
    }

    /// SET key NX EX ttl — returns whether the key already existed
    async fn set_if_absent(
        &self,
        hash: &str,
        mut redis: redis::aio::ConnectionManager,
    ) -> Result<bool, redis::RedisError> {
        let redis_key = format!("{}{}", DEDUP_KEY_PREFIX, hash);
        let reply: Option<String> = redis::cmd("SET")
            .arg(&redis_key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(&mut redis)
            .await?;
        // Nil reply means the key was already present
        Ok(reply.is_none())
    }

    /// Number of entries in the local cache
    pub fn len(&self) -> usize {
        self.seen.read().len()
    }

    /// Whether the local cache is empty
    pub fn is_empty(&self) -> bool {
        self.seen.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_stable() {
        let hash1 = content_hash("Quantum Leap", "Scientists discovered something.");
        let hash2 = content_hash("Quantum Leap", "Scientists discovered something.");
        let hash3 = content_hash("Quantum Leap", "Different body entirely.");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_content_hash_normalizes_case_and_whitespace() {
        let hash1 = content_hash("  Breaking News ", "The Story Text");
        let hash2 = content_hash("breaking news", "the story text  ");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_content_hash_depends_on_title() {
        let hash1 = content_hash("Title A", "same text");
        let hash2 = content_hash("Title B", "same text");
        assert_ne!(hash1, hash2);
    }

    #[tokio::test]
    async fn test_check_and_mark_local() {
        let store = DedupStore::new(1000, 86400);

        let hash = content_hash("title", "unique content");
        assert!(!store.check_and_mark(&hash).await);
        assert!(store.check_and_mark(&hash).await);
    }

    #[tokio::test]
    async fn test_cache_clears_on_overflow() {
        let store = DedupStore::new(2, 86400);

        assert!(!store.check_and_mark("hash-a").await);
        assert!(!store.check_and_mark("hash-b").await);
        assert_eq!(store.len(), 2);

        // Third insert clears the full cache first
        assert!(!store.check_and_mark("hash-c").await);
        assert_eq!(store.len(), 1);
    }
}
