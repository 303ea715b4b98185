/// Edge cache for processed images.
///
/// Keyed by the shared `processing::cache_key` derivation; entries expire by
/// TTL only. Re-uploading under a fresh key means stale entries are an
/// accepted staleness window, not a correctness issue.
use crate::error::{AppError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_TTL_SECONDS: u64 = 86400;

/// One cached processed image.
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub data: Bytes,
    pub content_type: String,
}

#[async_trait]
pub trait ImageCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedImage>>;

    /// Store an entry. `ttl` overrides the cache default when given.
    async fn put(&self, key: &str, image: &CachedImage, ttl: Option<u64>) -> Result<()>;
}

/// Redis-backed cache used in production.
#[derive(Clone)]
pub struct RedisImageCache {
    conn: Arc<Mutex<ConnectionManager>>,
    ttl_seconds: u64,
}

impl RedisImageCache {
    /// Wrap an established connection; the manager is shared with the rate
    /// limiter so startup opens a single Redis connection.
    pub fn with_manager(manager: Arc<Mutex<ConnectionManager>>, ttl_seconds: Option<u64>) -> Self {
        Self {
            conn: manager,
            ttl_seconds: ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS),
        }
    }
}

#[async_trait]
impl ImageCache for RedisImageCache {
    async fn get(&self, key: &str) -> Result<Option<CachedImage>> {
        let mut conn = self.conn.lock().await;
        let (content_type, body): (Option<String>, Option<Vec<u8>>) = redis::pipe()
            .hget(key, "ct")
            .hget(key, "body")
            .query_async(&mut *conn)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read from cache: {e}")))?;

        match (content_type, body) {
            (Some(content_type), Some(body)) => Ok(Some(CachedImage {
                data: Bytes::from(body),
                content_type,
            })),
            _ => Ok(None),
        }
    }

    async fn put(&self, key: &str, image: &CachedImage, ttl: Option<u64>) -> Result<()> {
        let ttl = ttl.unwrap_or(self.ttl_seconds);
        let mut conn = self.conn.lock().await;
        redis::pipe()
            .hset(key, "ct", &image.content_type)
            .ignore()
            .hset(key, "body", image.data.as_ref())
            .ignore()
            .expire(key, ttl as i64)
            .ignore()
            .query_async::<_, ()>(&mut *conn)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write to cache: {e}")))
    }
}

/// Process-local cache for tests and cache-less dev setups.
#[derive(Default)]
pub struct MemoryImageCache {
    entries: DashMap<String, (CachedImage, Option<Instant>)>,
    default_ttl: Option<Duration>,
}

impl MemoryImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl: Some(ttl),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[async_trait]
impl ImageCache for MemoryImageCache {
    async fn get(&self, key: &str) -> Result<Option<CachedImage>> {
        if let Some(entry) = self.entries.get(key) {
            let (image, expires) = entry.value();
            if expires.map(|at| Instant::now() < at).unwrap_or(true) {
                return Ok(Some(image.clone()));
            }
        }
        Ok(None)
    }

    async fn put(&self, key: &str, image: &CachedImage, ttl: Option<u64>) -> Result<()> {
        let expires = ttl
            .map(Duration::from_secs)
            .or(self.default_ttl)
            .map(|d| Instant::now() + d);
        self.entries
            .insert(key.to_string(), (image.clone(), expires));
        Ok(())
    }
}
