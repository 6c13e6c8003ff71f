//! Sharding service configuration
//!
//! Heuristic constants (users per shard, imbalance threshold, jitter) are
//! defaults rather than fixed laws; every one can be overridden from TOML.

use crate::error::{Result, ShardError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main sharding configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShardingConfig {
    /// Connection templates keyed by region
    #[serde(default)]
    pub region_templates: HashMap<String, String>,

    /// Fallback template, `{region}` is substituted
    #[serde(default = "default_template")]
    pub default_template: String,

    /// Load spread (percentage points) above which rebalancing is proposed
    #[serde(default = "default_imbalance_threshold")]
    pub imbalance_threshold_percent: f64,

    /// Fraction of the heaviest shard's load proposed for migration
    #[serde(default = "default_migration_fraction")]
    pub migration_fraction: f64,

    /// Estimated minutes per remediation action
    #[serde(default = "default_minutes_per_action")]
    pub minutes_per_action: u64,

    /// Active users one shard is sized for
    #[serde(default = "default_users_per_shard")]
    pub users_per_shard: u64,

    /// Daily queries one shard is sized for
    #[serde(default = "default_queries_per_shard")]
    pub queries_per_shard_per_day: u64,

    /// Relative jitter applied to even load weights (0.1 = ±10%)
    #[serde(default = "default_load_weight_jitter")]
    pub load_weight_jitter: f64,

    /// Positive floor for distributed load weights
    #[serde(default = "default_min_load_weight")]
    pub min_load_weight: f64,

    /// Maximum cached shard keys
    #[serde(default = "default_cache_capacity")]
    pub shard_key_cache_capacity: usize,

    /// Maximum cached performance samples
    #[serde(default = "default_cache_capacity")]
    pub performance_cache_capacity: usize,

    /// Upper bound on a single telemetry call in milliseconds
    #[serde(default = "default_telemetry_timeout")]
    pub telemetry_timeout_ms: u64,

    /// Base time of a cross-region sync in seconds
    #[serde(default = "default_sync_base_secs")]
    pub sync_base_secs: f64,

    /// Per-region factor applied to the sync base time
    #[serde(default = "default_sync_region_factor")]
    pub sync_region_factor: f64,

    /// Cultural background that represents each region for routing
    #[serde(default)]
    pub representative_backgrounds: HashMap<String, String>,

    /// Background used when a region has no representative
    #[serde(default = "default_background")]
    pub default_background: String,
}

fn default_template() -> String {
    "Server=db-{region}.heritage.internal;Database=cultural_intelligence_{region};".to_string()
}

fn default_imbalance_threshold() -> f64 {
    30.0
}

fn default_migration_fraction() -> f64 {
    0.25
}

fn default_minutes_per_action() -> u64 {
    5
}

fn default_users_per_shard() -> u64 {
    25_000
}

fn default_queries_per_shard() -> u64 {
    100_000
}

fn default_load_weight_jitter() -> f64 {
    0.10
}

fn default_min_load_weight() -> f64 {
    0.01
}

fn default_cache_capacity() -> usize {
    10_000
}

fn default_telemetry_timeout() -> u64 {
    5000
}

fn default_sync_base_secs() -> f64 {
    10.0
}

fn default_sync_region_factor() -> f64 {
    0.3
}

fn default_background() -> String {
    "sinhala_buddhist".to_string()
}

impl Default for ShardingConfig {
    fn default() -> Self {
        Self {
            region_templates: HashMap::new(),
            default_template: default_template(),
            imbalance_threshold_percent: default_imbalance_threshold(),
            migration_fraction: default_migration_fraction(),
            minutes_per_action: default_minutes_per_action(),
            users_per_shard: default_users_per_shard(),
            queries_per_shard_per_day: default_queries_per_shard(),
            load_weight_jitter: default_load_weight_jitter(),
            min_load_weight: default_min_load_weight(),
            shard_key_cache_capacity: default_cache_capacity(),
            performance_cache_capacity: default_cache_capacity(),
            telemetry_timeout_ms: default_telemetry_timeout(),
            sync_base_secs: default_sync_base_secs(),
            sync_region_factor: default_sync_region_factor(),
            representative_backgrounds: HashMap::new(),
            default_background: default_background(),
        }
    }
}

impl ShardingConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ShardingConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    /// Write configuration as pretty TOML
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the planners cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.imbalance_threshold_percent.is_finite()
            || !(0.0..=100.0).contains(&self.imbalance_threshold_percent)
        {
            return Err(ShardError::Config(format!(
                "imbalance_threshold_percent must be within 0..=100, got {}",
                self.imbalance_threshold_percent
            )));
        }
        if !(self.migration_fraction > 0.0 && self.migration_fraction <= 1.0) {
            return Err(ShardError::Config(format!(
                "migration_fraction must be within (0, 1], got {}",
                self.migration_fraction
            )));
        }
        if self.users_per_shard == 0 || self.queries_per_shard_per_day == 0 {
            return Err(ShardError::Config(
                "shard sizing constants must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.load_weight_jitter) {
            return Err(ShardError::Config(format!(
                "load_weight_jitter must be within [0, 1), got {}",
                self.load_weight_jitter
            )));
        }
        if !(self.min_load_weight > 0.0 && self.min_load_weight <= 1.0) {
            return Err(ShardError::Config(format!(
                "min_load_weight must be within (0, 1], got {}",
                self.min_load_weight
            )));
        }
        if self.shard_key_cache_capacity == 0 || self.performance_cache_capacity == 0 {
            return Err(ShardError::Config(
                "cache capacities must be positive".to_string(),
            ));
        }
        if !self.default_template.contains("{region}") {
            return Err(ShardError::Config(
                "default_template must contain a {region} placeholder".to_string(),
            ));
        }
        Ok(())
    }

    /// Get telemetry timeout as Duration
    pub fn telemetry_timeout(&self) -> Duration {
        Duration::from_millis(self.telemetry_timeout_ms)
    }
}
