//! Bounded in-memory LRU cache
//!
//! Recency is an access tick per entry plus a tick-ordered index, so a hit
//! and an eviction both cost `O(log n)` under the lock.

use super::{Cache, CacheStats};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

struct LruEntry<V> {
    value: V,
    last_accessed: u64,
}

struct LruState<V> {
    entries: HashMap<String, LruEntry<V>>,
    // last_accessed tick -> key, oldest first
    recency: BTreeMap<u64, String>,
    tick: u64,
}

impl<V> LruState<V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch(&mut self, key: &str) -> Option<&LruEntry<V>> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.last_accessed);
        entry.last_accessed = tick;
        self.recency.insert(tick, key.to_string());
        Some(entry)
    }

    fn evict_lru(&mut self) -> Option<String> {
        let (_, key) = self.recency.pop_first()?;
        self.entries.remove(&key)?;
        Some(key)
    }
}

/// Entry-count bounded LRU cache
#[derive(Clone)]
pub struct MemoryCache<V> {
    state: Arc<Mutex<LruState<V>>>,
    capacity: usize,
    stats: Arc<CacheStats>,
}

impl<V: Clone> MemoryCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(LruState {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                tick: 0,
            })),
            capacity: capacity.max(1),
            stats: Arc::new(CacheStats::new()),
        }
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entry_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    fn lookup(&self, key: &str) -> Option<V> {
        let mut state = self.state.lock();
        match state.touch(key) {
            Some(entry) => {
                self.stats.hit();
                Some(entry.value.clone())
            }
            None => {
                self.stats.miss();
                None
            }
        }
    }

    fn insert(&self, key: String, value: V) {
        let mut state = self.state.lock();

        if state.entries.contains_key(&key) {
            state.touch(&key);
            if let Some(existing) = state.entries.get_mut(&key) {
                existing.value = value;
            }
            return;
        }

        while state.entries.len() >= self.capacity {
            if state.evict_lru().is_none() {
                break;
            }
            self.stats.evict();
        }

        let tick = state.next_tick();
        state.recency.insert(tick, key.clone());
        state.entries.insert(
            key,
            LruEntry {
                value,
                last_accessed: tick,
            },
        );
    }
}

#[async_trait]
impl<V> Cache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(self.lookup(key))
    }

    async fn put(&self, key: String, value: V) -> Result<()> {
        self.insert(key, value);
        Ok(())
    }

    async fn values(&self) -> Result<Vec<V>> {
        Ok(self
            .state
            .lock()
            .entries
            .values()
            .map(|entry| entry.value.clone())
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entry_count())
    }
}
