//! Shard performance monitoring
//!
//! Samples shards through the telemetry source, derives a health score and
//! keeps the most recent sample per shard in the performance cache.
//!
//! Health is a weighted penalty model:
//!
//! ```text
//! health = 1 - 0.5 * latency_penalty - 0.3 * error_rate - 0.2 * utilization_penalty
//!
//! latency_penalty     = clamp((avg_ms - 100) / 400, 0, 1)
//! utilization_penalty = clamp((max(cpu, mem) - 0.7) / 0.3, 0, 1)
//! ```

use crate::cache::Cache;
use crate::collaborators::{TelemetryReading, TelemetrySource};
use crate::error::{Result, ShardError};
use crate::metrics;
use crate::types::{require_field, LoadMetrics, PerformanceSample, ShardKey};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Health below which rebalancing is recommended
const REBALANCE_HEALTH_THRESHOLD: f64 = 0.8;

/// Average response time above which indexing is recommended
const SLOW_RESPONSE_MS: f64 = 200.0;

/// Derive a health score in [0, 1] from a telemetry reading
pub fn health_score(reading: &TelemetryReading) -> f64 {
    let latency_penalty = ((reading.avg_response_time_ms - 100.0) / 400.0).clamp(0.0, 1.0);
    let error_rate = reading.error_rate.clamp(0.0, 1.0);
    let utilization = reading.cpu_utilization.max(reading.memory_utilization);
    let utilization_penalty = ((utilization - 0.7) / 0.3).clamp(0.0, 1.0);

    (1.0 - 0.5 * latency_penalty - 0.3 * error_rate - 0.2 * utilization_penalty).clamp(0.0, 1.0)
}

/// Samples shard performance and serves cached health
pub struct PerformanceMonitor {
    telemetry: Arc<dyn TelemetrySource>,
    samples: Arc<dyn Cache<PerformanceSample>>,
    timeout: Duration,
}

impl PerformanceMonitor {
    pub fn new(
        telemetry: Arc<dyn TelemetrySource>,
        samples: Arc<dyn Cache<PerformanceSample>>,
        timeout: Duration,
    ) -> Self {
        Self {
            telemetry,
            samples,
            timeout,
        }
    }

    /// Observe a shard over `window` and cache the result
    pub async fn sample_shard_performance(
        &self,
        shard_id: &str,
        window: Duration,
    ) -> Result<PerformanceSample> {
        require_field("shard_id", shard_id)?;
        if window.is_zero() {
            return Err(ShardError::Validation(
                "sampling window must be positive".to_string(),
            ));
        }

        let reading = tokio::time::timeout(self.timeout, self.telemetry.sample(shard_id, window))
            .await
            .map_err(|e| {
                warn!(shard_id = %shard_id, "Telemetry sample timed out");
                ShardError::from(e)
            })?
            .map_err(|e| ShardError::from_dependency("telemetry source", e))?;
        validate_reading(shard_id, &reading)?;

        let sample = PerformanceSample {
            shard_id: shard_id.to_string(),
            region: reading.region.clone(),
            period_ms: window.as_millis() as u64,
            avg_response_time_ms: reading.avg_response_time_ms,
            throughput_per_second: reading.throughput_per_second,
            health_score: health_score(&reading),
            custom_metrics: reading.custom_metrics,
            sampled_at: Utc::now(),
        };

        self.samples.put(shard_id.to_string(), sample.clone()).await?;
        metrics::update_shard_health(shard_id, &sample.region, sample.health_score);

        debug!(
            shard_id = %shard_id,
            region = %sample.region,
            health = sample.health_score,
            avg_ms = sample.avg_response_time_ms,
            "Sampled shard performance"
        );
        Ok(sample)
    }

    /// Cached health scores of every sampled shard in a region
    pub async fn health_scores(&self, region: &str) -> Result<HashMap<String, f64>> {
        require_field("region", region)?;
        let scores: HashMap<String, f64> = self
            .samples
            .values()
            .await?
            .into_iter()
            .filter(|s| s.region == region)
            .map(|s| (s.shard_id, s.health_score))
            .collect();

        debug!(region = %region, count = scores.len(), "Collected shard health scores");
        Ok(scores)
    }

    /// Most recent cached sample for a shard
    pub async fn latest_sample(&self, shard_id: &str) -> Result<PerformanceSample> {
        self.samples
            .get(shard_id)
            .await?
            .ok_or_else(|| ShardError::NotFound(format!("no performance sample for shard {}", shard_id)))
    }

    /// Current load of the given shards from the telemetry source
    pub async fn load_metrics(&self, shard_ids: &[String]) -> Result<HashMap<String, LoadMetrics>> {
        if shard_ids.is_empty() {
            return Ok(HashMap::new());
        }
        tokio::time::timeout(self.timeout, self.telemetry.load_metrics(shard_ids))
            .await?
            .map_err(|e| ShardError::from_dependency("telemetry source", e))
    }
}

/// Tuning suggestions for a shard given its latest sample
pub fn recommended_optimizations(shard_key: &ShardKey, sample: &PerformanceSample) -> Vec<String> {
    let mut optimizations = Vec::new();
    if sample.health_score < REBALANCE_HEALTH_THRESHOLD {
        optimizations.push(format!(
            "Consider rebalancing shard {} to distribute load more evenly",
            shard_key.shard_id
        ));
    }
    if sample.avg_response_time_ms > SLOW_RESPONSE_MS {
        optimizations.push(format!(
            "Improve indexing for {} queries",
            shard_key.data_type
        ));
    }
    optimizations.push("Enable cultural data caching for diaspora community access".to_string());
    optimizations
}

fn validate_reading(shard_id: &str, reading: &TelemetryReading) -> Result<()> {
    let numbers = [
        reading.avg_response_time_ms,
        reading.throughput_per_second,
        reading.error_rate,
        reading.cpu_utilization,
        reading.memory_utilization,
    ];
    if numbers.iter().any(|n| !n.is_finite() || *n < 0.0) {
        return Err(ShardError::Dependency(format!(
            "telemetry returned an invalid reading for shard {}",
            shard_id
        )));
    }
    if reading.region.trim().is_empty() {
        return Err(ShardError::Dependency(format!(
            "telemetry reading for shard {} has no region",
            shard_id
        )));
    }
    Ok(())
}
