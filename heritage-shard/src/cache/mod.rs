//! Cache layer for shard keys and performance samples
//!
//! Both caches are process-wide shared state. The [`Cache`] trait lets a
//! distributed cache be injected; [`MemoryCache`] is a bounded in-memory LRU
//! that is the default and what tests use. Writes are last-writer-wins.

mod lru;
mod stats;

pub use lru::MemoryCache;
pub use stats::CacheStats;

use crate::error::Result;
use async_trait::async_trait;

/// Key/value cache shared by the sharding components
#[async_trait]
pub trait Cache<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Look up a value, `None` on miss
    async fn get(&self, key: &str) -> Result<Option<V>>;

    /// Insert or overwrite a value
    async fn put(&self, key: String, value: V) -> Result<()>;

    /// Snapshot of all cached values
    async fn values(&self) -> Result<Vec<V>>;

    /// Number of cached entries
    async fn len(&self) -> Result<usize>;
}
