//! Query routing
//!
//! Picks the shard for a query context, asks the affinity balancer to
//! confirm the choice, and estimates response time from a fixed per-query
//! latency table scaled by the caller's performance requirement.

use crate::collaborators::{AffinityBalancer, CulturalClassifier};
use crate::error::{Result, ShardError};
use crate::resolver::ShardKeyResolver;
use crate::types::{
    require_field, CachingPreference, CulturalDataType, PerformanceRequirement, QueryContext,
    ShardKey,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Confidence of a route the balancer fully agrees with
const BASE_CONFIDENCE: f64 = 0.92;

/// Optimization hint attached to a routed query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOptimization {
    /// Always applied
    PerformanceIndexing,
    /// Applied for real-time requirements
    RealTimeTuning,
    /// Applied when the caller set a caching preference
    Caching,
}

impl QueryOptimization {
    pub fn description(&self) -> &'static str {
        match self {
            QueryOptimization::PerformanceIndexing => "Performance indexing enabled",
            QueryOptimization::RealTimeTuning => "Real-time query optimization",
            QueryOptimization::Caching => "Cultural intelligence caching enabled",
        }
    }
}

/// Result of a routing decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingResult {
    pub selected_shard: ShardKey,
    pub optimizations: Vec<QueryOptimization>,
    pub estimated_response_time: Duration,
    /// Routing certainty within [0, 1]
    pub confidence_score: f64,
    /// Region the balancer will serve from
    pub serving_region: String,
    pub routing_reason: String,
}

/// Routes queries to shards
pub struct QueryRouter {
    resolver: Arc<ShardKeyResolver>,
    classifier: Arc<dyn CulturalClassifier>,
    balancer: Arc<dyn AffinityBalancer>,
}

impl QueryRouter {
    pub fn new(
        resolver: Arc<ShardKeyResolver>,
        classifier: Arc<dyn CulturalClassifier>,
        balancer: Arc<dyn AffinityBalancer>,
    ) -> Self {
        Self {
            resolver,
            classifier,
            balancer,
        }
    }

    /// Route a query to its shard
    pub async fn optimize_routing(&self, query: &QueryContext) -> Result<RoutingResult> {
        require_field("region", &query.region)?;

        let context = self
            .classifier
            .representative(&query.region)
            .await
            .map_err(|e| match e {
                ShardError::Validation(_) => e,
                other => ShardError::from_dependency("cultural classifier", other),
            })?;

        let shard = self
            .resolver
            .determine_shard_key(&context, CulturalDataType::CommunityInsights)
            .await?;

        let decision = self
            .balancer
            .confirm(query, &shard)
            .await
            .map_err(|e| ShardError::from_dependency("affinity balancer", e))?;

        let affinity = decision.affinity_score.clamp(0.0, 1.0);
        let confidence_score = if decision.confirmed {
            BASE_CONFIDENCE * affinity
        } else {
            warn!(
                shard_id = %shard.shard_id,
                region = %query.region,
                balancer_region = %decision.selected_region,
                "Affinity balancer did not confirm route"
            );
            BASE_CONFIDENCE * affinity * 0.5
        };

        let estimated_response_time = estimate_response_time(query);
        let result = RoutingResult {
            optimizations: query_optimizations(query),
            estimated_response_time,
            confidence_score,
            serving_region: decision.selected_region,
            routing_reason: format!(
                "Optimized for {:?} with {:?} requirements",
                query.query_type, query.performance_requirement
            ),
            selected_shard: shard,
        };

        debug!(
            shard_id = %result.selected_shard.shard_id,
            region = %query.region,
            "Routed {:?} query (estimated {}ms)",
            query.query_type,
            estimated_response_time.as_millis()
        );

        Ok(result)
    }
}

/// Base latency for the query type scaled by the performance requirement
pub fn estimate_response_time(query: &QueryContext) -> Duration {
    let millis = query.query_type.base_latency_ms() * query.performance_requirement.latency_multiplier();
    Duration::from_micros((millis * 1000.0).round() as u64)
}

/// Optimization hints that apply to a query
pub fn query_optimizations(query: &QueryContext) -> Vec<QueryOptimization> {
    let mut optimizations = vec![QueryOptimization::PerformanceIndexing];
    if query.performance_requirement == PerformanceRequirement::RealTime {
        optimizations.push(QueryOptimization::RealTimeTuning);
    }
    if query.caching_preference != CachingPreference::None {
        optimizations.push(QueryOptimization::Caching);
    }
    optimizations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::collaborators::{AcceptingBalancer, AffinityDecision, StaticClassifier};
    use crate::types::QueryType;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct DecliningBalancer;

    #[async_trait]
    impl AffinityBalancer for DecliningBalancer {
        async fn confirm(&self, _query: &QueryContext, _candidate: &ShardKey) -> Result<AffinityDecision> {
            Ok(AffinityDecision {
                confirmed: false,
                selected_region: "south_asia".to_string(),
                affinity_score: 0.6,
            })
        }
    }

    struct DownBalancer;

    #[async_trait]
    impl AffinityBalancer for DownBalancer {
        async fn confirm(&self, _query: &QueryContext, _candidate: &ShardKey) -> Result<AffinityDecision> {
            Err(ShardError::Internal("503 from balancer".to_string()))
        }
    }

    fn router(balancer: Arc<dyn AffinityBalancer>) -> QueryRouter {
        let resolver = Arc::new(ShardKeyResolver::new(Arc::new(MemoryCache::new(64))));
        let classifier = Arc::new(StaticClassifier::new(
            HashMap::new(),
            "sinhala_buddhist".to_string(),
        ));
        QueryRouter::new(resolver, classifier, balancer)
    }

    #[test]
    fn test_response_time_table() {
        let query = QueryContext::new("europe", QueryType::CrossCulturalAnalysis);
        assert_eq!(estimate_response_time(&query), Duration::from_millis(300));

        let query = QueryContext::new("europe", QueryType::CulturalCalendar)
            .with_requirement(PerformanceRequirement::RealTime);
        assert_eq!(estimate_response_time(&query).as_millis(), 35);

        let query = QueryContext::new("europe", QueryType::DiasporaAnalytics)
            .with_requirement(PerformanceRequirement::FastResponse);
        assert_eq!(estimate_response_time(&query).as_micros(), 127_500);
    }

    #[test]
    fn test_optimization_hints() {
        let plain = QueryContext::new("europe", QueryType::EventRecommendations);
        assert_eq!(
            query_optimizations(&plain),
            vec![QueryOptimization::PerformanceIndexing]
        );

        let full = QueryContext::new("europe", QueryType::EventRecommendations)
            .with_requirement(PerformanceRequirement::RealTime)
            .with_caching(CachingPreference::Aggressive);
        assert_eq!(
            query_optimizations(&full),
            vec![
                QueryOptimization::PerformanceIndexing,
                QueryOptimization::RealTimeTuning,
                QueryOptimization::Caching,
            ]
        );
    }

    #[tokio::test]
    async fn test_route_confirmed() {
        let router = router(Arc::new(AcceptingBalancer));
        let query = QueryContext::new("europe", QueryType::DiasporaAnalytics);

        let result = router.optimize_routing(&query).await.unwrap();
        assert_eq!(result.selected_shard.region, "europe");
        assert_eq!(result.serving_region, "europe");
        assert!((result.confidence_score - 0.92).abs() < 1e-9);
        assert_eq!(
            result.routing_reason,
            "Optimized for DiasporaAnalytics with Standard requirements"
        );

        // Same region routes to the same shard
        let again = router.optimize_routing(&query).await.unwrap();
        assert_eq!(again.selected_shard.shard_id, result.selected_shard.shard_id);
    }

    #[tokio::test]
    async fn test_route_declined_lowers_confidence() {
        let router = router(Arc::new(DecliningBalancer));
        let query = QueryContext::new("europe", QueryType::CulturalCalendar);

        let result = router.optimize_routing(&query).await.unwrap();
        assert!(result.confidence_score < 0.92 * 0.6);
        assert_eq!(result.serving_region, "south_asia");
    }

    #[tokio::test]
    async fn test_balancer_failure_is_dependency_error() {
        let router = router(Arc::new(DownBalancer));
        let query = QueryContext::new("europe", QueryType::CulturalCalendar);

        let err = router.optimize_routing(&query).await.unwrap_err();
        assert!(matches!(err, ShardError::Dependency(_)));
    }

    #[tokio::test]
    async fn test_missing_region_rejected() {
        let router = router(Arc::new(AcceptingBalancer));
        let query = QueryContext::new("", QueryType::CulturalCalendar);

        let err = router.optimize_routing(&query).await.unwrap_err();
        assert!(matches!(err, ShardError::Validation(_)));
    }
}
