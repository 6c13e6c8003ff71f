//! Heritage Shard - Cultural-context-aware shard routing and rebalancing
//!
//! This crate assigns data partitions to geographic regions and community
//! groups, routes queries to the right shard with latency estimates, detects
//! load imbalance and proposes rebalancing, plans cross-region replication of
//! cultural events, and sizes shard capacity from usage figures.
//!
//! # Architecture
//!
//! - **Resolver**: deterministic shard keys from cultural context, cached
//! - **Connection**: per-region connection descriptors from templates
//! - **Distribution**: even load weights across communities, diaspora sizing
//! - **Router**: shard selection confirmed by an affinity load balancer
//! - **Rebalance**: imbalance detection, remediation plans, idempotent migrations
//! - **Sync**: significance-driven consistency for cross-region replication
//! - **Monitor**: telemetry sampling and health scores
//! - **Capacity**: optimal shard counts from usage and growth
//! - **Service**: facade with cancellation, panic containment and metrics
//!
//! # Key Operations
//!
//! - Placement: determine shard key, build connection descriptor, calculate distribution
//! - Routing: optimize routing, list available shards
//! - Rebalancing: handle rebalancing, execute migration
//! - Operations: plan synchronization, sample performance, health scores
//! - Planning: optimal shard count, recommended optimizations
//!
//! External systems (telemetry, load balancer, storage) are reached through
//! the traits in [`collaborators`].

pub mod cache;
pub mod capacity;
pub mod collaborators;
pub mod config;
pub mod connection;
pub mod distribution;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod rebalance;
pub mod resolver;
pub mod router;
pub mod service;
pub mod sync;
pub mod types;

pub use cache::{Cache, CacheStats, MemoryCache};
pub use capacity::{CapacityPlan, CapacityPlanner, CapacityProjection, MIN_SHARD_COUNT};
pub use collaborators::{
    AcceptingBalancer, AffinityBalancer, AffinityDecision, CulturalClassifier, MigrationExecutor,
    StaticClassifier, StaticTemplateSource, TelemetryReading, TelemetrySource, TemplateSource,
};
pub use config::ShardingConfig;
pub use connection::{ConnectionDescriptor, ConnectionDescriptorBuilder};
pub use distribution::{DiasporaAllocation, DistributionPlanner};
pub use error::{Result, ShardError};
pub use monitor::{health_score, recommended_optimizations, PerformanceMonitor};
pub use rebalance::{
    MigrationLedger, MigrationRecord, MigrationState, RebalanceAction, RebalanceActionKind,
    RebalancePhase, RebalancePlan, RebalanceStatus, RebalancingCoordinator,
};
pub use resolver::{derive_shard_id, ShardKeyResolver};
pub use router::{QueryOptimization, QueryRouter, RoutingResult};
pub use service::{ShardingService, ShardingServiceBuilder};
pub use sync::{consistency_for, CrossRegionSynchronizer, SyncPhase, SyncPlan, SyncRequest, SyncStep};
pub use types::*;

pub use tokio_util::sync::CancellationToken;
