//! Shard distribution planning
//!
//! Spreads a batch of communities in one region across shards with roughly
//! even load weights, and sizes diaspora communities by user count.

use crate::config::ShardingConfig;
use crate::error::{Result, ShardError};
use crate::resolver::ShardDigest;
use crate::types::{require_field, CulturalDataType, ShardKey};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Storage estimate per user in GB (25 MB)
const STORAGE_GB_PER_USER: f64 = 0.025;

/// Average queries per second per user
const QPS_PER_USER: f64 = 0.003;

/// Shard and resource allocation for one diaspora community
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiasporaAllocation {
    pub community_id: String,
    pub region: String,
    pub estimated_users: u64,
    pub allocated_shards: u32,
    pub storage_gb: f64,
    pub expected_queries_per_second: f64,
    pub recommendations: Vec<String>,
}

/// Assigns shard keys and load weights to communities
#[derive(Debug, Clone)]
pub struct DistributionPlanner {
    jitter: f64,
    min_load_weight: f64,
}

impl DistributionPlanner {
    pub fn new(jitter: f64, min_load_weight: f64) -> Self {
        Self {
            jitter,
            min_load_weight,
        }
    }

    pub fn from_config(config: &ShardingConfig) -> Self {
        Self::new(config.load_weight_jitter, config.min_load_weight)
    }

    /// Assign exactly one shard key per distinct community
    ///
    /// Duplicate community names collapse onto their first occurrence, so
    /// `N` counts distinct communities.
    pub fn calculate_distribution(
        &self,
        communities: &[String],
        region: &str,
    ) -> Result<HashMap<String, ShardKey>> {
        require_field("region", region)?;
        if communities.is_empty() {
            return Err(ShardError::Validation(
                "community list must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut distinct = Vec::with_capacity(communities.len());
        for community in communities {
            require_field("community", community)?;
            if seen.insert(community.as_str()) {
                distinct.push(community);
            }
        }

        let total = distinct.len();
        let base_weight = 1.0 / total as f64;
        // The configured floor gives way once 1/N itself drops below it
        let floor = self.min_load_weight.min(base_weight * (1.0 - self.jitter));
        let mut distribution = HashMap::with_capacity(total);
        let mut shard_ids = HashSet::with_capacity(total);

        for (index, community) in distinct.into_iter().enumerate() {
            let digest = ShardDigest::new(community, region, index);
            // Relative jitter in [-jitter, +jitter]
            let adjustment = self.jitter * (2.0 * digest.unit() - 1.0);
            let load_weight = (base_weight * (1.0 + adjustment)).clamp(floor, 1.0);

            let shard_id = digest.shard_id();
            if !shard_ids.insert(shard_id.clone()) {
                return Err(ShardError::Internal(format!(
                    "shard id collision for community {} in region {}",
                    community, region
                )));
            }

            debug!(
                community = %community,
                region = %region,
                shard_id = %shard_id,
                load_weight,
                "Assigned community shard"
            );

            distribution.insert(
                community.clone(),
                ShardKey {
                    shard_id,
                    region: region.to_string(),
                    community_group: community.clone(),
                    data_type: CulturalDataType::CommunityInsights,
                    load_weight,
                    reason: "Community distribution".to_string(),
                },
            );
        }

        info!(
            "Calculated shard distribution for {} communities in region {}",
            total, region
        );
        Ok(distribution)
    }

    /// Size shards, storage and throughput for diaspora communities by user count
    pub fn plan_diaspora_allocation(
        &self,
        user_counts: &HashMap<String, u64>,
    ) -> Result<Vec<DiasporaAllocation>> {
        if user_counts.is_empty() {
            return Err(ShardError::Validation(
                "diaspora community map must not be empty".to_string(),
            ));
        }

        let mut allocations: Vec<DiasporaAllocation> = user_counts
            .iter()
            .map(|(community_id, &users)| -> Result<DiasporaAllocation> {
                require_field("community_id", community_id)?;
                let shards = shards_for_users(users);
                Ok(DiasporaAllocation {
                    community_id: community_id.clone(),
                    region: region_from_community_id(community_id),
                    estimated_users: users,
                    allocated_shards: shards,
                    storage_gb: users as f64 * STORAGE_GB_PER_USER,
                    expected_queries_per_second: users as f64 * QPS_PER_USER,
                    recommendations: allocation_recommendations(users, shards),
                })
            })
            .collect::<Result<_>>()?;
        allocations.sort_by(|a, b| a.community_id.cmp(&b.community_id));

        info!(
            "Calculated diaspora allocation for {} communities",
            allocations.len()
        );
        Ok(allocations)
    }
}

fn shards_for_users(users: u64) -> u32 {
    match users {
        0..=49_999 => 2,
        50_000..=199_999 => 3,
        200_000..=499_999 => 5,
        _ => (users / 100_000 + 2).min(8) as u32,
    }
}

/// Region is the last `_` segment of ids with more than two segments
fn region_from_community_id(community_id: &str) -> String {
    let parts: Vec<&str> = community_id.split('_').collect();
    if parts.len() > 2 {
        parts[parts.len() - 1].to_string()
    } else {
        "global".to_string()
    }
}

fn allocation_recommendations(users: u64, shards: u32) -> Vec<String> {
    let mut recommendations = Vec::new();
    if users > 100_000 {
        recommendations.push("Enable read replicas for cultural query performance".to_string());
    }
    if shards > 3 {
        recommendations.push("Tune connection pooling for multi-shard queries".to_string());
    }
    recommendations.push("Cache cultural data for diaspora access patterns".to_string());
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn communities(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("community_{}", i)).collect()
    }

    #[test]
    fn test_one_entry_per_community_with_distinct_ids() {
        let planner = DistributionPlanner::from_config(&ShardingConfig::default());
        let input = communities(12);
        let distribution = planner.calculate_distribution(&input, "europe").unwrap();

        assert_eq!(distribution.len(), 12);
        let ids: HashSet<_> = distribution.values().map(|k| k.shard_id.clone()).collect();
        assert_eq!(ids.len(), 12);
        for community in &input {
            assert_eq!(distribution[community].community_group, *community);
        }
    }

    #[test]
    fn test_weights_sum_near_one() {
        let planner = DistributionPlanner::from_config(&ShardingConfig::default());
        for n in [1, 2, 5, 17, 40] {
            let distribution = planner
                .calculate_distribution(&communities(n), "north_america")
                .unwrap();
            let sum: f64 = distribution.values().map(|k| k.load_weight).sum();
            assert!((sum - 1.0).abs() <= 0.3, "n={} sum={}", n, sum);
            assert!(distribution
                .values()
                .all(|k| k.load_weight > 0.0 && k.load_weight <= 1.0));
        }
    }

    #[test]
    fn test_weights_sum_near_one_for_large_batches() {
        let planner = DistributionPlanner::from_config(&ShardingConfig::default());
        for n in [100, 131, 200, 500, 2_000] {
            let distribution = planner
                .calculate_distribution(&communities(n), "europe")
                .unwrap();
            let sum: f64 = distribution.values().map(|k| k.load_weight).sum();
            assert!((sum - 1.0).abs() <= 0.3, "n={} sum={}", n, sum);
            assert!(distribution.values().all(|k| k.load_weight > 0.0));
        }
    }

    #[test]
    fn test_deterministic() {
        let planner = DistributionPlanner::from_config(&ShardingConfig::default());
        let a = planner.calculate_distribution(&communities(5), "oceania").unwrap();
        let b = planner.calculate_distribution(&communities(5), "oceania").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicates_collapse() {
        let planner = DistributionPlanner::from_config(&ShardingConfig::default());
        let input = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let distribution = planner.calculate_distribution(&input, "europe").unwrap();
        assert_eq!(distribution.len(), 2);
    }

    #[test]
    fn test_empty_list_rejected() {
        let planner = DistributionPlanner::from_config(&ShardingConfig::default());
        let err = planner.calculate_distribution(&[], "europe").unwrap_err();
        assert!(matches!(err, ShardError::Validation(_)));
    }

    #[test]
    fn test_diaspora_allocation_tiers() {
        let planner = DistributionPlanner::from_config(&ShardingConfig::default());
        let mut counts = HashMap::new();
        counts.insert("sinhala_buddhist_london".to_string(), 30_000);
        counts.insert("tamil_toronto".to_string(), 150_000);
        counts.insert("sri_lankan_diaspora_melbourne".to_string(), 1_200_000);

        let allocations = planner.plan_diaspora_allocation(&counts).unwrap();
        assert_eq!(allocations.len(), 3);

        let london = &allocations[0];
        assert_eq!(london.community_id, "sinhala_buddhist_london");
        assert_eq!(london.region, "london");
        assert_eq!(london.allocated_shards, 2);
        assert_eq!(london.recommendations.len(), 1);

        let melbourne = &allocations[1];
        assert_eq!(melbourne.region, "melbourne");
        assert_eq!(melbourne.allocated_shards, 8);
        assert!((melbourne.storage_gb - 30_000.0).abs() < 1e-6);

        let toronto = &allocations[2];
        assert_eq!(toronto.region, "global");
        assert_eq!(toronto.allocated_shards, 3);
        assert!((toronto.expected_queries_per_second - 450.0).abs() < 1e-9);
    }

    #[test]
    fn test_shards_for_users_boundaries() {
        assert_eq!(shards_for_users(49_999), 2);
        assert_eq!(shards_for_users(50_000), 3);
        assert_eq!(shards_for_users(200_000), 5);
        assert_eq!(shards_for_users(500_000), 7);
        assert_eq!(shards_for_users(10_000_000), 8);
    }
}
