//! Property tests for placement determinism and distribution shape

use heritage_shard::{
    derive_shard_id, CulturalContext, CulturalDataType, DistributionPlanner, MemoryCache,
    ShardKeyResolver, ShardingConfig,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn data_type() -> impl Strategy<Value = CulturalDataType> {
    prop_oneof![
        Just(CulturalDataType::CommunityInsights),
        Just(CulturalDataType::CalendarEvents),
        Just(CulturalDataType::BusinessDirectory),
        Just(CulturalDataType::DiasporaAnalytics),
        Just(CulturalDataType::EventSignups),
    ]
}

proptest! {
    #[test]
    fn prop_shard_key_deterministic_across_resolvers(
        community in "[a-z_]{1,16}",
        background in "[a-z_]{1,16}",
        region in "[a-z_]{1,12}",
        data_type in data_type(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let ctx = CulturalContext::new(&community, &background, &region);

        let (first, second, fresh) = runtime.block_on(async {
            let resolver = ShardKeyResolver::new(Arc::new(MemoryCache::new(8)));
            let first = resolver.determine_shard_key(&ctx, data_type).await.unwrap();
            let second = resolver.determine_shard_key(&ctx, data_type).await.unwrap();
            let other = ShardKeyResolver::new(Arc::new(MemoryCache::new(8)));
            let fresh = other.determine_shard_key(&ctx, data_type).await.unwrap();
            (first, second, fresh)
        });

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&first, &fresh);
        prop_assert!((0.5..=1.0).contains(&first.load_weight));
        prop_assert_eq!(first.shard_id, derive_shard_id(&background, &region, 0));
    }

    #[test]
    fn prop_distribution_complete_and_balanced(
        communities in prop::collection::hash_set("[a-z]{3,10}", 1..1000),
        region in "[a-z_]{1,12}",
    ) {
        let communities: Vec<String> = communities.into_iter().collect();
        let planner = DistributionPlanner::from_config(&ShardingConfig::default());
        let distribution = planner.calculate_distribution(&communities, &region).unwrap();

        prop_assert_eq!(distribution.len(), communities.len());
        let ids: HashSet<_> = distribution.values().map(|k| k.shard_id.clone()).collect();
        prop_assert_eq!(ids.len(), communities.len());

        let sum: f64 = distribution.values().map(|k| k.load_weight).sum();
        prop_assert!((sum - 1.0).abs() <= 0.3, "sum = {}", sum);
        for key in distribution.values() {
            prop_assert!(key.load_weight > 0.0 && key.load_weight <= 1.0);
        }
    }
}
