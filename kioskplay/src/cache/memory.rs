//! In-memory video cache using moka.
//!
//! Used for dry runs and tests, where nothing should touch the disk. Entries
//! are weighted by byte length and evicted LRU once the capacity is reached.
//! Cached copies are addressed as [`LocalRef::Memory`].

use bytes::Bytes;
use moka::future::Cache;
use tracing::debug;

use super::probe;
use super::traits::{check_filename, CacheError, CacheResult, CacheUsage, CachedVideo, LocalCache};
use crate::http::BoxFuture;
use crate::manifest::LocalRef;

/// Default capacity: 512 MB.
pub const DEFAULT_MEMORY_CAPACITY_BYTES: u64 = 512 * 1024 * 1024;

/// Video cache held in memory.
#[derive(Clone)]
pub struct MemoryCache {
    cache: Cache<String, Bytes>,
    max_size_bytes: u64,
}

impl MemoryCache {
    /// Creates a cache bounded to `max_size_bytes`.
    pub fn new(max_size_bytes: u64) -> Self {
        let cache = Cache::builder()
            .weigher(|_key: &String, value: &Bytes| -> u32 {
                // moka weights are u32
                value.len().min(u32::MAX as usize) as u32
            })
            .max_capacity(max_size_bytes)
            .build();

        Self {
            cache,
            max_size_bytes,
        }
    }

    /// Stored bytes for `filename`.
    pub async fn get(&self, filename: &str) -> Option<Bytes> {
        self.cache.get(filename).await
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY_BYTES)
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.cache.entry_count())
            .field("max_size_bytes", &self.max_size_bytes)
            .finish()
    }
}

impl LocalCache for MemoryCache {
    fn exists(&self, filename: &str) -> BoxFuture<'_, CacheResult<bool>> {
        let filename = filename.to_string();
        Box::pin(async move {
            check_filename(&filename)?;
            Ok(self
                .cache
                .get(&filename)
                .await
                .is_some_and(|data| !data.is_empty()))
        })
    }

    fn save(&self, filename: &str, data: Bytes) -> BoxFuture<'_, CacheResult<LocalRef>> {
        let filename = filename.to_string();
        Box::pin(async move {
            check_filename(&filename)?;
            debug!(filename = %filename, bytes = data.len(), "Saved video to memory cache");
            self.cache.insert(filename.clone(), data).await;
            Ok(LocalRef::Memory(filename))
        })
    }

    fn verify(&self, filename: &str) -> BoxFuture<'_, CacheResult<CachedVideo>> {
        let filename = filename.to_string();
        Box::pin(async move {
            check_filename(&filename)?;
            let data = self
                .cache
                .get(&filename)
                .await
                .ok_or_else(|| CacheError::NotFound(filename.clone()))?;
            if data.is_empty() {
                return Err(CacheError::VerificationFailed {
                    filename,
                    reason: "file is empty".to_string(),
                });
            }
            let header = &data[..data.len().min(probe::PROBE_LEN)];
            match probe::detect(header) {
                Some(container) => Ok(CachedVideo {
                    local_ref: LocalRef::Memory(filename),
                    size_bytes: data.len() as u64,
                    container,
                }),
                None => Err(CacheError::VerificationFailed {
                    filename,
                    reason: "unrecognized container header".to_string(),
                }),
            }
        })
    }

    fn list(&self) -> BoxFuture<'_, CacheResult<Vec<String>>> {
        Box::pin(async move {
            self.cache.run_pending_tasks().await;
            let mut names: Vec<String> = self.cache.iter().map(|(k, _)| k.to_string()).collect();
            names.sort();
            Ok(names)
        })
    }

    fn remove(&self, filename: &str) -> BoxFuture<'_, CacheResult<bool>> {
        let filename = filename.to_string();
        Box::pin(async move {
            check_filename(&filename)?;
            Ok(self.cache.remove(&filename).await.is_some())
        })
    }

    fn usage(&self) -> BoxFuture<'_, CacheResult<CacheUsage>> {
        Box::pin(async move {
            // entry_count and weighted_size are eventually consistent
            self.cache.run_pending_tasks().await;
            Ok(CacheUsage {
                files: self.cache.entry_count(),
                bytes: self.cache.weighted_size(),
            })
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
