//! Sharding service observability metrics
//!
//! Prometheus-compatible metrics, recorded through the `metrics` facade:
//! - Operation duration and outcome
//! - Shard-key cache hits/misses
//! - Rebalancing analyses, lock waits and migrations
//! - Sync plans by consistency level
//! - Per-shard health score

use crate::types::ConsistencyLevel;
use std::time::Duration;

/// Record a successful operation
pub fn record_operation_success(operation: &str, duration: Duration) {
    metrics::counter!(
        "heritage_operations_total",
        "operation" => operation.to_string(),
        "status" => "ok",
    )
    .increment(1);

    metrics::histogram!(
        "heritage_operation_duration_seconds",
        "operation" => operation.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record a failed operation
pub fn record_operation_error(operation: &str, error_type: &str, duration: Duration) {
    metrics::counter!(
        "heritage_operations_total",
        "operation" => operation.to_string(),
        "status" => "error",
    )
    .increment(1);

    metrics::counter!(
        "heritage_operation_errors_total",
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string(),
    )
    .increment(1);

    metrics::histogram!(
        "heritage_operation_duration_seconds",
        "operation" => operation.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record a shard-key cache lookup
pub fn record_shard_key_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!(
        "heritage_shard_key_cache_total",
        "result" => result,
    )
    .increment(1);
}

/// Record time spent waiting for the rebalancing lock
pub fn record_rebalance_lock_wait(duration: Duration) {
    metrics::histogram!("heritage_rebalance_lock_wait_seconds").record(duration.as_secs_f64());
}

/// Record the outcome of a rebalancing analysis
pub fn record_rebalance_analysis(required: bool, spread_percent: f64) {
    let outcome = if required { "required" } else { "balanced" };
    metrics::counter!(
        "heritage_rebalance_analyses_total",
        "outcome" => outcome,
    )
    .increment(1);

    metrics::gauge!("heritage_load_spread_percent").set(spread_percent);
}

/// Record a migration state change ("started", "completed", "skipped", "failed")
pub fn record_migration(source: &str, target: &str, status: &'static str) {
    metrics::counter!(
        "heritage_migrations_total",
        "source" => source.to_string(),
        "target" => target.to_string(),
        "status" => status,
    )
    .increment(1);
}

/// Record a generated synchronization plan
pub fn record_sync_plan(level: ConsistencyLevel, region_count: usize) {
    metrics::counter!(
        "heritage_sync_plans_total",
        "consistency" => level.as_str(),
    )
    .increment(1);

    metrics::histogram!("heritage_sync_target_regions").record(region_count as f64);
}

/// Update the health gauge of a shard
pub fn update_shard_health(shard_id: &str, region: &str, health_score: f64) {
    metrics::gauge!(
        "heritage_shard_health_score",
        "shard" => shard_id.to_string(),
        "region" => region.to_string(),
    )
    .set(health_score);
}
