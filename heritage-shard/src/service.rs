//! Sharding service facade
//!
//! [`ShardingService`] wires the components together and is the only
//! surface callers use. Every operation runs inside the same boundary:
//!
//! ```text
//! caller ── CancellationToken ──┐
//!                               ▼
//!   select! { cancelled => Cancelled,
//!             catch_unwind(operation) => Ok | Err | panic → Dependency }
//!                               │
//!                               ▼
//!            log failure + record duration/outcome metrics
//! ```
//!
//! Each public operation runs in a span carrying the identifiers it was
//! called with (community, region, shard id, event id), so the boundary
//! log lines are attributable.
//!
//! Cancellation drops the in-flight future at its current suspension point.
//! Planning operations have no external side effects, and migrations are
//! recorded in a ledger so a cancelled one can be re-run.

use crate::cache::{Cache, CacheStats, MemoryCache};
use crate::capacity::{CapacityPlan, CapacityPlanner};
use crate::collaborators::{
    AcceptingBalancer, AffinityBalancer, CulturalClassifier, MigrationExecutor, StaticClassifier,
    StaticTemplateSource, TelemetrySource, TemplateSource,
};
use crate::config::ShardingConfig;
use crate::connection::{ConnectionDescriptor, ConnectionDescriptorBuilder};
use crate::distribution::{DiasporaAllocation, DistributionPlanner};
use crate::error::{Result, ShardError};
use crate::metrics;
use crate::monitor::{self, PerformanceMonitor};
use crate::rebalance::{MigrationRecord, RebalancePlan, RebalanceStatus, RebalancingCoordinator};
use crate::resolver::ShardKeyResolver;
use crate::router::{QueryRouter, RoutingResult};
use crate::sync::{CrossRegionSynchronizer, SyncPlan, SyncRequest};
use crate::types::{
    require_field, CommunityUsageMetrics, CulturalContext, CulturalDataType, LoadMetrics, PerformanceSample,
    QueryContext, ShardKey,
};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

/// Builder for [`ShardingService`]
///
/// Telemetry and migration execution have no local fallback and must be
/// supplied. Templates and the classifier default to config-backed
/// implementations, the balancer to [`AcceptingBalancer`], and both caches
/// to bounded [`MemoryCache`]s.
pub struct ShardingServiceBuilder {
    config: ShardingConfig,
    templates: Option<Arc<dyn TemplateSource>>,
    classifier: Option<Arc<dyn CulturalClassifier>>,
    balancer: Option<Arc<dyn AffinityBalancer>>,
    telemetry: Option<Arc<dyn TelemetrySource>>,
    executor: Option<Arc<dyn MigrationExecutor>>,
    shard_key_cache: Option<Arc<dyn Cache<ShardKey>>>,
    performance_cache: Option<Arc<dyn Cache<PerformanceSample>>>,
}

impl ShardingServiceBuilder {
    pub fn new(config: ShardingConfig) -> Self {
        Self {
            config,
            templates: None,
            classifier: None,
            balancer: None,
            telemetry: None,
            executor: None,
            shard_key_cache: None,
            performance_cache: None,
        }
    }

    pub fn templates(mut self, templates: Arc<dyn TemplateSource>) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn CulturalClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn balancer(mut self, balancer: Arc<dyn AffinityBalancer>) -> Self {
        self.balancer = Some(balancer);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetrySource>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn MigrationExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Use an external shard-key cache instead of the in-memory LRU
    pub fn shard_key_cache(mut self, cache: Arc<dyn Cache<ShardKey>>) -> Self {
        self.shard_key_cache = Some(cache);
        self
    }

    /// Use an external performance-sample cache instead of the in-memory LRU
    pub fn performance_cache(mut self, cache: Arc<dyn Cache<PerformanceSample>>) -> Self {
        self.performance_cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<ShardingService> {
        self.config.validate()?;
        let config = self.config;

        let telemetry = self
            .telemetry
            .ok_or_else(|| ShardError::Config("a telemetry source is required".to_string()))?;
        let executor = self
            .executor
            .ok_or_else(|| ShardError::Config("a migration executor is required".to_string()))?;
        let templates = self
            .templates
            .unwrap_or_else(|| Arc::new(StaticTemplateSource::from_config(&config)) as Arc<dyn TemplateSource>);
        let classifier = self
            .classifier
            .unwrap_or_else(|| Arc::new(StaticClassifier::from_config(&config)) as Arc<dyn CulturalClassifier>);
        let balancer = self
            .balancer
            .unwrap_or_else(|| Arc::new(AcceptingBalancer) as Arc<dyn AffinityBalancer>);

        let (shard_key_cache, shard_key_stats) = match self.shard_key_cache {
            Some(cache) => (cache, None),
            None => {
                let cache = MemoryCache::new(config.shard_key_cache_capacity);
                let stats = cache.stats();
                (Arc::new(cache) as Arc<dyn Cache<ShardKey>>, Some(stats))
            }
        };
        let (performance_cache, performance_stats) = match self.performance_cache {
            Some(cache) => (cache, None),
            None => {
                let cache = MemoryCache::new(config.performance_cache_capacity);
                let stats = cache.stats();
                (Arc::new(cache) as Arc<dyn Cache<PerformanceSample>>, Some(stats))
            }
        };

        let resolver = Arc::new(ShardKeyResolver::new(shard_key_cache));

        Ok(ShardingService {
            connections: ConnectionDescriptorBuilder::new(templates),
            distribution: DistributionPlanner::from_config(&config),
            router: QueryRouter::new(Arc::clone(&resolver), classifier, balancer),
            rebalancer: RebalancingCoordinator::new(&config, executor),
            synchronizer: CrossRegionSynchronizer::from_config(&config),
            monitor: PerformanceMonitor::new(telemetry, performance_cache, config.telemetry_timeout()),
            capacity: CapacityPlanner::from_config(&config),
            resolver,
            shard_key_stats,
            performance_stats,
            config,
        })
    }
}

/// Cultural-context-aware shard routing and rebalancing service
pub struct ShardingService {
    config: ShardingConfig,
    resolver: Arc<ShardKeyResolver>,
    connections: ConnectionDescriptorBuilder,
    distribution: DistributionPlanner,
    router: QueryRouter,
    rebalancer: RebalancingCoordinator,
    synchronizer: CrossRegionSynchronizer,
    monitor: PerformanceMonitor,
    capacity: CapacityPlanner,
    shard_key_stats: Option<Arc<CacheStats>>,
    performance_stats: Option<Arc<CacheStats>>,
}

impl ShardingService {
    pub fn builder(config: ShardingConfig) -> ShardingServiceBuilder {
        ShardingServiceBuilder::new(config)
    }

    pub fn config(&self) -> &ShardingConfig {
        &self.config
    }

    /// Hit/miss statistics of the built-in shard-key cache
    pub fn shard_key_cache_stats(&self) -> Option<Arc<CacheStats>> {
        self.shard_key_stats.clone()
    }

    /// Hit/miss statistics of the built-in performance cache
    pub fn performance_cache_stats(&self) -> Option<Arc<CacheStats>> {
        self.performance_stats.clone()
    }

    /// Resolve the shard for a cultural context and data type
    #[instrument(
        skip_all,
        fields(community = %context.community_id, region = %context.geographic_region, data_type = %data_type)
    )]
    pub async fn determine_shard_key(
        &self,
        context: &CulturalContext,
        data_type: CulturalDataType,
        cancel: &CancellationToken,
    ) -> Result<ShardKey> {
        guard(
            "determine_shard_key",
            cancel,
            self.resolver.determine_shard_key(context, data_type),
        )
        .await
    }

    #[instrument(skip_all, fields(shard_id = %shard_key.shard_id, region = %shard_key.region))]
    pub async fn build_connection_descriptor(
        &self,
        shard_key: &ShardKey,
        cancel: &CancellationToken,
    ) -> Result<ConnectionDescriptor> {
        guard(
            "build_connection_descriptor",
            cancel,
            self.connections.build(shard_key),
        )
        .await
    }

    /// Assign one shard key per community in a region
    #[instrument(skip_all, fields(region = %region, communities = communities.len()))]
    pub async fn calculate_distribution(
        &self,
        communities: &[String],
        region: &str,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, ShardKey>> {
        guard("calculate_distribution", cancel, async {
            self.distribution.calculate_distribution(communities, region)
        })
        .await
    }

    /// Size shards and resources for diaspora communities
    #[instrument(skip_all, fields(communities = user_counts.len()))]
    pub async fn plan_diaspora_allocation(
        &self,
        user_counts: &HashMap<String, u64>,
        cancel: &CancellationToken,
    ) -> Result<Vec<DiasporaAllocation>> {
        guard("plan_diaspora_allocation", cancel, async {
            self.distribution.plan_diaspora_allocation(user_counts)
        })
        .await
    }

    #[instrument(skip_all, fields(region = %query.region, query_type = ?query.query_type))]
    pub async fn optimize_routing(
        &self,
        query: &QueryContext,
        cancel: &CancellationToken,
    ) -> Result<RoutingResult> {
        guard("optimize_routing", cancel, self.router.optimize_routing(query)).await
    }

    /// Analyze reported load, waiting for any running rebalancing
    #[instrument(skip_all, fields(shards = distribution.len()))]
    pub async fn handle_rebalancing(
        &self,
        distribution: &HashMap<String, LoadMetrics>,
        cancel: &CancellationToken,
    ) -> Result<RebalancePlan> {
        guard(
            "handle_rebalancing",
            cancel,
            self.rebalancer.handle_rebalancing(distribution),
        )
        .await
    }

    /// Analyze reported load, failing with `ConcurrencyBusy` if a rebalancing is running
    #[instrument(skip_all, fields(shards = distribution.len()))]
    pub async fn try_handle_rebalancing(
        &self,
        distribution: &HashMap<String, LoadMetrics>,
        cancel: &CancellationToken,
    ) -> Result<RebalancePlan> {
        guard(
            "try_handle_rebalancing",
            cancel,
            self.rebalancer.try_handle_rebalancing(distribution),
        )
        .await
    }

    /// Fetch current load from telemetry and analyze it
    #[instrument(skip_all, fields(shards = shard_ids.len()))]
    pub async fn rebalance_from_telemetry(
        &self,
        shard_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<RebalancePlan> {
        guard("rebalance_from_telemetry", cancel, async {
            let distribution = self.monitor.load_metrics(shard_ids).await?;
            self.rebalancer.handle_rebalancing(&distribution).await
        })
        .await
    }

    /// Move a data type between shards; safe to retry
    #[instrument(skip_all, fields(source = %source, target = %target, data_type = %data_type))]
    pub async fn execute_migration(
        &self,
        source: &str,
        target: &str,
        data_type: CulturalDataType,
        cancel: &CancellationToken,
    ) -> Result<MigrationRecord> {
        guard(
            "execute_migration",
            cancel,
            self.rebalancer.execute_migration(source, target, data_type),
        )
        .await
    }

    pub fn migration_record(
        &self,
        source: &str,
        target: &str,
        data_type: CulturalDataType,
    ) -> Result<MigrationRecord> {
        self.rebalancer.migration_record(source, target, data_type)
    }

    pub fn rebalance_status(&self) -> RebalanceStatus {
        self.rebalancer.status()
    }

    #[instrument(
        skip_all,
        fields(event_id = %request.event_id, regions = request.target_regions.len())
    )]
    pub async fn plan_synchronization(
        &self,
        request: &SyncRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncPlan> {
        guard("plan_synchronization", cancel, async {
            self.synchronizer.plan_synchronization(request)
        })
        .await
    }

    #[instrument(skip_all, fields(shard_id = %shard_id))]
    pub async fn sample_shard_performance(
        &self,
        shard_id: &str,
        window: Duration,
        cancel: &CancellationToken,
    ) -> Result<PerformanceSample> {
        guard(
            "sample_shard_performance",
            cancel,
            self.monitor.sample_shard_performance(shard_id, window),
        )
        .await
    }

    /// Cached health score per shard in a region
    #[instrument(skip_all, fields(region = %region))]
    pub async fn health_scores(
        &self,
        region: &str,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, f64>> {
        guard("health_scores", cancel, self.monitor.health_scores(region)).await
    }

    #[instrument(skip_all, fields(region = %region, data_type = %data_type))]
    pub async fn available_shards(
        &self,
        region: &str,
        data_type: CulturalDataType,
        cancel: &CancellationToken,
    ) -> Result<Vec<ShardKey>> {
        guard(
            "available_shards",
            cancel,
            self.resolver.available_shards(region, data_type),
        )
        .await
    }

    #[instrument(skip_all, fields(community = %usage.community_id))]
    pub async fn calculate_optimal_shard_count(
        &self,
        usage: &CommunityUsageMetrics,
        cancel: &CancellationToken,
    ) -> Result<CapacityPlan> {
        guard("calculate_optimal_shard_count", cancel, async {
            self.capacity.calculate_optimal_shard_count(usage)
        })
        .await
    }

    #[instrument(skip_all, fields(shard_id = %shard_key.shard_id, region = %shard_key.region))]
    pub async fn recommended_optimizations(
        &self,
        shard_key: &ShardKey,
        sample: &PerformanceSample,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        guard("recommended_optimizations", cancel, async {
            require_field("shard_id", &shard_key.shard_id)?;
            Ok(monitor::recommended_optimizations(shard_key, sample))
        })
        .await
    }
}

/// Run one operation inside the service boundary
async fn guard<T, F>(operation: &'static str, cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let start = Instant::now();

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ShardError::Cancelled(format!("{} was cancelled", operation))),
        result = AssertUnwindSafe(fut).catch_unwind() => match result {
            Ok(result) => result,
            Err(panic) => Err(ShardError::Dependency(format!(
                "{} panicked: {}",
                operation,
                panic_message(panic.as_ref())
            ))),
        },
    };

    let elapsed = start.elapsed();
    match &outcome {
        Ok(_) => {
            debug!(operation = %operation, elapsed_ms = elapsed.as_millis() as u64, "Operation completed");
            metrics::record_operation_success(operation, elapsed);
        }
        Err(e) => {
            match e {
                ShardError::Validation(_)
                | ShardError::NotFound(_)
                | ShardError::ConcurrencyBusy(_)
                | ShardError::Cancelled(_) => {
                    warn!(operation = %operation, error = %e, "Operation failed")
                }
                ShardError::Dependency(_) | ShardError::Config(_) | ShardError::Internal(_) => {
                    error!(operation = %operation, error = %e, "Operation failed")
                }
            }
            metrics::record_operation_error(operation, e.error_type(), elapsed);
        }
    }
    outcome
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
