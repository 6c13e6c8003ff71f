//! Shard capacity planning
//!
//! Sizes a community's shard count from active users and daily queries,
//! scaled for the community's latency requirement and expected growth.

use crate::config::ShardingConfig;
use crate::error::{Result, ShardError};
use crate::types::CommunityUsageMetrics;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Shards are never planned below this count
pub const MIN_SHARD_COUNT: u32 = 2;

/// Migration time budgeted per planned shard
const MIGRATION_TIME_PER_SHARD: Duration = Duration::from_secs(2 * 3600);

/// Target average response time budget shared across shards
const RESPONSE_BUDGET_MS: u64 = 200;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Projected performance at the planned shard count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityProjection {
    /// Upper bound on the average response time
    pub max_average_response_ms: u64,
    /// Query rate of the whole community, independent of shard count
    pub community_queries_per_second: f64,
    pub queries_per_second_per_shard: f64,
    pub concurrent_users_per_shard: u64,
}

/// Result of a capacity calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityPlan {
    pub community_id: String,
    pub shard_count: u32,
    pub rationale: String,
    pub projection: CapacityProjection,
    pub recommendations: Vec<String>,
    pub estimated_migration_time: Duration,
}

/// Computes optimal shard counts
#[derive(Debug, Clone)]
pub struct CapacityPlanner {
    users_per_shard: u64,
    queries_per_shard_per_day: u64,
}

impl CapacityPlanner {
    pub fn new(users_per_shard: u64, queries_per_shard_per_day: u64) -> Self {
        Self {
            users_per_shard: users_per_shard.max(1),
            queries_per_shard_per_day: queries_per_shard_per_day.max(1),
        }
    }

    pub fn from_config(config: &ShardingConfig) -> Self {
        Self::new(config.users_per_shard, config.queries_per_shard_per_day)
    }

    /// Shard count before requirement and growth adjustments
    pub fn base_shard_count(&self, active_users: u64, daily_queries: u64) -> u64 {
        let by_users = active_users.div_ceil(self.users_per_shard);
        let by_queries = daily_queries.div_ceil(self.queries_per_shard_per_day);
        by_users.max(by_queries)
    }

    /// Calculate the optimal shard count for a community
    pub fn calculate_optimal_shard_count(&self, usage: &CommunityUsageMetrics) -> Result<CapacityPlan> {
        if usage.active_users <= 0 {
            return Err(ShardError::Validation(format!(
                "active users must be positive, got {}",
                usage.active_users
            )));
        }
        if usage.daily_queries < 0 {
            return Err(ShardError::Validation(format!(
                "daily queries must not be negative, got {}",
                usage.daily_queries
            )));
        }
        if !usage.data_growth_rate.is_finite() || usage.data_growth_rate <= -0.5 {
            return Err(ShardError::Validation(format!(
                "data growth rate must be a number above -0.5, got {}",
                usage.data_growth_rate
            )));
        }

        let users = usage.active_users as u64;
        let queries = usage.daily_queries as u64;
        let base = self.base_shard_count(users, queries);
        let performance = usage.performance_requirement.capacity_multiplier();
        let growth = 1.0 + 2.0 * usage.data_growth_rate;

        let scaled = (base as f64 * performance * growth).round();
        let shard_count = (scaled.min(u32::MAX as f64) as u32).max(MIN_SHARD_COUNT);

        let community_qps = queries as f64 / SECONDS_PER_DAY;
        let projection = CapacityProjection {
            max_average_response_ms: RESPONSE_BUDGET_MS / shard_count as u64,
            community_queries_per_second: community_qps,
            queries_per_second_per_shard: community_qps / shard_count as f64,
            concurrent_users_per_shard: users / shard_count as u64,
        };

        let mut recommendations = vec![
            format!("Distribute load across {} shards", shard_count),
            "Monitor community growth patterns for proactive scaling".to_string(),
            "Split shards automatically when utilization exceeds 75%".to_string(),
        ];
        if usage.data_growth_rate >= 0.5 {
            recommendations.push(format!(
                "Revisit capacity within a quarter, growth rate is {:.0}%",
                usage.data_growth_rate * 100.0
            ));
        }

        let rationale = format!(
            "Calculated for {} users, {} daily queries, {:.1}% growth rate and {:?} requirements \
             (base {} shards x {:.2} performance x {:.2} growth)",
            users,
            queries,
            usage.data_growth_rate * 100.0,
            usage.performance_requirement,
            base,
            performance,
            growth
        );

        info!(
            community = %usage.community_id,
            shard_count,
            base,
            "Calculated optimal shard count"
        );

        Ok(CapacityPlan {
            community_id: usage.community_id.clone(),
            shard_count,
            rationale,
            projection,
            recommendations,
            estimated_migration_time: MIGRATION_TIME_PER_SHARD * shard_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PerformanceRequirement;
    use proptest::prelude::*;

    fn usage(users: i64, queries: i64, requirement: PerformanceRequirement, growth: f64) -> CommunityUsageMetrics {
        CommunityUsageMetrics {
            community_id: "sinhala_buddhist_toronto".to_string(),
            active_users: users,
            daily_queries: queries,
            performance_requirement: requirement,
            data_growth_rate: growth,
        }
    }

    fn planner() -> CapacityPlanner {
        CapacityPlanner::from_config(&ShardingConfig::default())
    }

    #[test]
    fn test_standard_community_with_growth() {
        let plan = planner()
            .calculate_optimal_shard_count(&usage(250_000, 50_000, PerformanceRequirement::Standard, 0.1))
            .unwrap();

        assert_eq!(plan.shard_count, 12);
        assert_eq!(plan.estimated_migration_time, Duration::from_secs(24 * 3600));
        assert_eq!(plan.projection.concurrent_users_per_shard, 20_833);
        assert_eq!(plan.projection.max_average_response_ms, 16);
        let community_qps = 50_000.0 / 86_400.0;
        assert!((plan.projection.community_queries_per_second - community_qps).abs() < 1e-9);
        assert!((plan.projection.queries_per_second_per_shard - community_qps / 12.0).abs() < 1e-9);
        assert!(plan.rationale.contains("250000 users"));
        assert_eq!(plan.recommendations.len(), 3);
    }

    #[test]
    fn test_query_driven_real_time() {
        let plan = planner()
            .calculate_optimal_shard_count(&usage(10_000, 1_000_000, PerformanceRequirement::RealTime, 0.0))
            .unwrap();
        assert_eq!(plan.shard_count, 15);
    }

    #[test]
    fn test_small_community_hits_floor() {
        let plan = planner()
            .calculate_optimal_shard_count(&usage(10, 0, PerformanceRequirement::Relaxed, 0.0))
            .unwrap();
        assert_eq!(plan.shard_count, MIN_SHARD_COUNT);
    }

    #[test]
    fn test_non_positive_users_rejected() {
        for users in [0, -5] {
            let err = planner()
                .calculate_optimal_shard_count(&usage(users, 1_000, PerformanceRequirement::Standard, 0.1))
                .unwrap_err();
            assert!(matches!(err, ShardError::Validation(_)));
        }
    }

    #[test]
    fn test_base_count_rounds_up() {
        let planner = planner();
        assert_eq!(planner.base_shard_count(25_000, 0), 1);
        assert_eq!(planner.base_shard_count(25_001, 0), 2);
        assert_eq!(planner.base_shard_count(1, 100_001), 2);
    }

    proptest! {
        #[test]
        fn prop_never_below_floor(
            users in 1i64..5_000_000,
            queries in 0i64..50_000_000,
            growth in -0.45f64..3.0,
            requirement in prop_oneof![
                Just(PerformanceRequirement::RealTime),
                Just(PerformanceRequirement::FastResponse),
                Just(PerformanceRequirement::Standard),
                Just(PerformanceRequirement::Relaxed),
            ],
        ) {
            let plan = planner()
                .calculate_optimal_shard_count(&usage(users, queries, requirement, growth))
                .unwrap();
            prop_assert!(plan.shard_count >= MIN_SHARD_COUNT);
        }
    }
}
