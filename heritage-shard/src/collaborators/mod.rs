//! External collaborators consumed by the sharding service
//!
//! The service never talks to storage engines, telemetry pipelines or the
//! geographic load balancer directly. Each is a trait injected as
//! `Arc<dyn Trait>` so deployments plug in real clients and tests plug in
//! in-memory fakes.
//!
//! - **TemplateSource**: per-region connection templates
//! - **CulturalClassifier**: representative cultural context for a region
//! - **AffinityBalancer**: geographic/cultural-affinity confirmation of a route
//! - **TelemetrySource**: live load metrics and performance readings
//! - **MigrationExecutor**: moves data between two shards

mod r#static;

pub use r#static::{AcceptingBalancer, StaticClassifier, StaticTemplateSource};

use crate::error::Result;
use crate::types::{CulturalContext, CulturalDataType, LoadMetrics, QueryContext, ShardKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Source of per-region connection templates
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Template for a region, `None` when the region has no dedicated entry
    async fn template(&self, region: &str) -> Result<Option<String>>;

    /// Fallback template with a `{region}` placeholder
    async fn default_template(&self) -> Result<String>;
}

/// Supplies cultural contexts produced by the upstream classification step
#[async_trait]
pub trait CulturalClassifier: Send + Sync {
    /// A context that represents typical traffic for a region
    async fn representative(&self, region: &str) -> Result<CulturalContext>;
}

/// Outcome of asking the affinity load balancer about a candidate shard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffinityDecision {
    /// Whether the balancer agrees with the candidate
    pub confirmed: bool,
    /// Region the balancer would serve the request from
    pub selected_region: String,
    /// Balancer's affinity score within [0, 1]
    pub affinity_score: f64,
}

/// Geographic/cultural-affinity load balancer
#[async_trait]
pub trait AffinityBalancer: Send + Sync {
    async fn confirm(&self, query: &QueryContext, candidate: &ShardKey) -> Result<AffinityDecision>;
}

/// Raw reading returned by the telemetry source for one shard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryReading {
    pub region: String,
    pub avg_response_time_ms: f64,
    pub throughput_per_second: f64,
    /// Fraction of failed queries within [0, 1]
    #[serde(default)]
    pub error_rate: f64,
    #[serde(default)]
    pub cpu_utilization: f64,
    #[serde(default)]
    pub memory_utilization: f64,
    #[serde(default)]
    pub custom_metrics: HashMap<String, f64>,
}

/// External telemetry pipeline
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Current load metrics for the given shards
    async fn load_metrics(&self, shard_ids: &[String]) -> Result<HashMap<String, LoadMetrics>>;

    /// Observe one shard over a window
    async fn sample(&self, shard_id: &str, window: Duration) -> Result<TelemetryReading>;
}

/// Performs the physical data move between two shards
#[async_trait]
pub trait MigrationExecutor: Send + Sync {
    /// Move the data type's records from source to target, returning the
    /// number of records moved. Must tolerate being re-run after a partial move.
    async fn move_data(&self, source: &str, target: &str, data_type: CulturalDataType) -> Result<u64>;
}
