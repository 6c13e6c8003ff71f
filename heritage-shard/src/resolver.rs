//! Shard key resolution
//!
//! Maps a (cultural background, region, data type) triple to a [`ShardKey`].
//! Shard ids come from a SHA-256 digest of `(community group, region, index)`,
//! so a cache miss always recomputes the same key and concurrent misses are
//! harmless: the last writer stores an identical value.

use crate::cache::Cache;
use crate::error::{Result, ShardError};
use crate::metrics;
use crate::types::{require_field, CulturalContext, CulturalDataType, ShardKey};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

/// Digest of a shard identity, shared by the resolver and the distribution planner
pub(crate) struct ShardDigest([u8; 32]);

impl ShardDigest {
    pub(crate) fn new(community: &str, region: &str, index: usize) -> Self {
        let digest = Sha256::digest(format!("{}:{}:{}", community, region, index).as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Shard id formatted as a UUID from the first 16 digest bytes
    pub(crate) fn shard_id(&self) -> String {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&self.0[..16]);
        uuid::Uuid::from_bytes(bytes).to_string()
    }

    /// Deterministic value in [0, 1] taken from bytes the shard id does not use
    pub(crate) fn unit(&self) -> f64 {
        let raw = u16::from_be_bytes([self.0[16], self.0[17]]);
        raw as f64 / u16::MAX as f64
    }
}

/// Derive the stable shard id for a community in a region
pub fn derive_shard_id(community: &str, region: &str, index: usize) -> String {
    ShardDigest::new(community, region, index).shard_id()
}

/// Resolves and caches shard keys
pub struct ShardKeyResolver {
    cache: Arc<dyn Cache<ShardKey>>,
}

impl ShardKeyResolver {
    /// Create a resolver on top of a shared shard-key cache
    pub fn new(cache: Arc<dyn Cache<ShardKey>>) -> Self {
        Self { cache }
    }

    /// Composite cache key for a context and data type
    pub fn cache_key(context: &CulturalContext, data_type: CulturalDataType) -> String {
        format!(
            "{}:{}:{}",
            context.cultural_background, context.geographic_region, data_type
        )
    }

    /// Determine the shard key for a context, served from cache when possible
    pub async fn determine_shard_key(
        &self,
        context: &CulturalContext,
        data_type: CulturalDataType,
    ) -> Result<ShardKey> {
        context.validate()?;

        let cache_key = Self::cache_key(context, data_type);
        if let Some(cached) = self.cache.get(&cache_key).await? {
            metrics::record_shard_key_lookup(true);
            debug!(
                community = %context.community_id,
                region = %context.geographic_region,
                shard_id = %cached.shard_id,
                "Retrieved shard key from cache"
            );
            return Ok(cached);
        }
        metrics::record_shard_key_lookup(false);

        let shard_key = Self::generate(context, data_type);
        self.cache.put(cache_key, shard_key.clone()).await?;

        info!(
            community = %context.community_id,
            region = %context.geographic_region,
            shard_id = %shard_key.shard_id,
            data_type = %data_type,
            "Generated shard key"
        );

        Ok(shard_key)
    }

    /// Cached shards for a region and data type
    pub async fn available_shards(
        &self,
        region: &str,
        data_type: CulturalDataType,
    ) -> Result<Vec<ShardKey>> {
        require_field("region", region)?;

        let mut shards: Vec<ShardKey> = self
            .cache
            .values()
            .await?
            .into_iter()
            .filter(|key| key.region == region && key.data_type == data_type)
            .collect();
        shards.sort_by(|a, b| a.shard_id.cmp(&b.shard_id));

        debug!(
            region = %region,
            data_type = %data_type,
            count = shards.len(),
            "Listed available shards"
        );
        Ok(shards)
    }

    /// Look up one cached shard by id
    pub async fn find_shard(&self, shard_id: &str) -> Result<ShardKey> {
        self.cache
            .values()
            .await?
            .into_iter()
            .find(|key| key.shard_id == shard_id)
            .ok_or_else(|| ShardError::NotFound(format!("shard {}", shard_id)))
    }

    // The shard belongs to the community group (cultural background), so
    // every community sharing a background and region lands on one shard.
    fn generate(context: &CulturalContext, data_type: CulturalDataType) -> ShardKey {
        let digest = ShardDigest::new(&context.cultural_background, &context.geographic_region, 0);

        ShardKey {
            shard_id: digest.shard_id(),
            region: context.geographic_region.clone(),
            community_group: context.cultural_background.clone(),
            data_type,
            // Provisional estimate until telemetry reports real load
            load_weight: 0.5 + 0.5 * digest.unit(),
            reason: "Cultural-context pattern-based sharding".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn make_resolver() -> (ShardKeyResolver, MemoryCache<ShardKey>) {
        let cache = MemoryCache::new(100);
        let resolver = ShardKeyResolver::new(Arc::new(cache.clone()));
        (resolver, cache)
    }

    #[test]
    fn test_shard_id_is_stable() {
        let a = derive_shard_id("sinhala_buddhist", "europe", 0);
        let b = derive_shard_id("sinhala_buddhist", "europe", 0);
        let c = derive_shard_id("sinhala_buddhist", "europe", 1);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 36);
    }

    #[tokio::test]
    async fn test_second_call_is_cache_hit() {
        let (resolver, cache) = make_resolver();
        let ctx = CulturalContext::new("london_sangha", "sinhala_buddhist", "europe");

        let first = resolver
            .determine_shard_key(&ctx, CulturalDataType::CommunityInsights)
            .await
            .unwrap();
        let second = resolver
            .determine_shard_key(&ctx, CulturalDataType::CommunityInsights)
            .await
            .unwrap();

        assert_eq!(first.shard_id, second.shard_id);
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.stats().hits(), 1);
    }

    #[tokio::test]
    async fn test_recompute_after_eviction_is_identical() {
        let ctx = CulturalContext::new("toronto_temple", "tamil_hindu", "north_america");

        let (first_resolver, _) = make_resolver();
        let (second_resolver, _) = make_resolver();

        let a = first_resolver
            .determine_shard_key(&ctx, CulturalDataType::CalendarEvents)
            .await
            .unwrap();
        let b = second_resolver
            .determine_shard_key(&ctx, CulturalDataType::CalendarEvents)
            .await
            .unwrap();

        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_load_weight_in_provisional_range() {
        let (resolver, _) = make_resolver();
        for region in ["europe", "north_america", "oceania", "south_asia", "middle_east"] {
            let ctx = CulturalContext::new("c", "sinhala_buddhist", region);
            let key = resolver
                .determine_shard_key(&ctx, CulturalDataType::CommunityInsights)
                .await
                .unwrap();
            assert!((0.5..=1.0).contains(&key.load_weight), "{}", key.load_weight);
        }
    }

    #[tokio::test]
    async fn test_missing_fields_rejected() {
        let (resolver, cache) = make_resolver();
        let ctx = CulturalContext::new("c1", "sinhala_buddhist", "");

        let err = resolver
            .determine_shard_key(&ctx, CulturalDataType::CommunityInsights)
            .await
            .unwrap_err();
        assert!(matches!(err, ShardError::Validation(_)));
        assert_eq!(cache.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_available_shards_filters_region_and_type() {
        let (resolver, _) = make_resolver();
        let eu = CulturalContext::new("c1", "sinhala_buddhist", "europe");
        let na = CulturalContext::new("c2", "sinhala_buddhist", "north_america");

        resolver
            .determine_shard_key(&eu, CulturalDataType::CommunityInsights)
            .await
            .unwrap();
        resolver
            .determine_shard_key(&eu, CulturalDataType::CalendarEvents)
            .await
            .unwrap();
        resolver
            .determine_shard_key(&na, CulturalDataType::CommunityInsights)
            .await
            .unwrap();

        let shards = resolver
            .available_shards("europe", CulturalDataType::CommunityInsights)
            .await
            .unwrap();
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].region, "europe");

        let found = resolver.find_shard(&shards[0].shard_id).await.unwrap();
        assert_eq!(found.region, "europe");
        assert!(matches!(
            resolver.find_shard("unknown").await,
            Err(ShardError::NotFound(_))
        ));
    }
}
