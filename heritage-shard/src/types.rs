//! Shared types for shard routing
//!
//! These types flow between the resolver, planners, router and monitor.
//! Most are plain serde values; [`ShardKey`] is immutable once created.

use crate::error::{Result, ShardError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Cultural classification of a community, produced upstream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CulturalContext {
    pub community_id: String,
    pub cultural_background: String,
    pub geographic_region: String,
}

impl CulturalContext {
    pub fn new(community_id: &str, cultural_background: &str, geographic_region: &str) -> Self {
        Self {
            community_id: community_id.to_string(),
            cultural_background: cultural_background.to_string(),
            geographic_region: geographic_region.to_string(),
        }
    }

    /// Check that every field needed for shard placement is present
    pub fn validate(&self) -> Result<()> {
        require_field("community_id", &self.community_id)?;
        require_field("cultural_background", &self.cultural_background)?;
        require_field("geographic_region", &self.geographic_region)?;
        Ok(())
    }
}

pub(crate) fn require_field(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ShardError::Validation(format!("{} is required", name)));
    }
    Ok(())
}

/// Kind of cultural-intelligence data held by a shard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CulturalDataType {
    #[default]
    CommunityInsights,
    CalendarEvents,
    BusinessDirectory,
    DiasporaAnalytics,
    EventSignups,
}

impl CulturalDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CulturalDataType::CommunityInsights => "community_insights",
            CulturalDataType::CalendarEvents => "calendar_events",
            CulturalDataType::BusinessDirectory => "business_directory",
            CulturalDataType::DiasporaAnalytics => "diaspora_analytics",
            CulturalDataType::EventSignups => "event_signups",
        }
    }
}

impl fmt::Display for CulturalDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a data partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardKey {
    pub shard_id: String,
    pub region: String,
    pub community_group: String,
    pub data_type: CulturalDataType,
    /// Fractional share of capacity, always within [0, 1]
    pub load_weight: f64,
    pub reason: String,
}

/// Load reported for a shard by the telemetry source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadMetrics {
    pub load_percentage: f64,
    pub connection_count: u64,
    pub queries_per_second: f64,
}

impl LoadMetrics {
    pub fn new(load_percentage: f64, connection_count: u64, queries_per_second: f64) -> Self {
        Self {
            load_percentage,
            connection_count,
            queries_per_second,
        }
    }
}

/// Category of an incoming query, drives the base latency estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    CulturalCalendar,
    DiasporaAnalytics,
    CrossCulturalAnalysis,
    EventRecommendations,
    BusinessDirectory,
}

impl QueryType {
    /// Fixed base latency in milliseconds
    pub fn base_latency_ms(&self) -> f64 {
        match self {
            QueryType::CulturalCalendar => 50.0,
            QueryType::DiasporaAnalytics => 150.0,
            QueryType::CrossCulturalAnalysis => 300.0,
            QueryType::EventRecommendations => 100.0,
            QueryType::BusinessDirectory => 100.0,
        }
    }
}

/// Latency requirement of a caller, strictest first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceRequirement {
    RealTime,
    FastResponse,
    #[default]
    Standard,
    Relaxed,
}

impl PerformanceRequirement {
    /// Multiplier applied to base query latency
    pub fn latency_multiplier(&self) -> f64 {
        match self {
            PerformanceRequirement::RealTime => 0.7,
            PerformanceRequirement::FastResponse => 0.85,
            PerformanceRequirement::Standard | PerformanceRequirement::Relaxed => 1.0,
        }
    }

    /// Multiplier applied to the base shard count
    pub fn capacity_multiplier(&self) -> f64 {
        match self {
            PerformanceRequirement::RealTime => 1.5,
            PerformanceRequirement::FastResponse => 1.2,
            PerformanceRequirement::Standard => 1.0,
            PerformanceRequirement::Relaxed => 0.8,
        }
    }
}

/// Caller's caching preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachingPreference {
    #[default]
    None,
    ReadThrough,
    Aggressive,
}

/// Per-request routing context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryContext {
    pub region: String,
    pub query_type: QueryType,
    #[serde(default)]
    pub performance_requirement: PerformanceRequirement,
    #[serde(default)]
    pub caching_preference: CachingPreference,
}

impl QueryContext {
    pub fn new(region: &str, query_type: QueryType) -> Self {
        Self {
            region: region.to_string(),
            query_type,
            performance_requirement: PerformanceRequirement::default(),
            caching_preference: CachingPreference::default(),
        }
    }

    pub fn with_requirement(mut self, requirement: PerformanceRequirement) -> Self {
        self.performance_requirement = requirement;
        self
    }

    pub fn with_caching(mut self, preference: CachingPreference) -> Self {
        self.caching_preference = preference;
        self
    }
}

/// Importance of a cultural event, ordered Low < ... < Sacred
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignificanceTier {
    #[default]
    Low,
    Medium,
    High,
    Critical,
    Sacred,
}

/// Cross-region visibility guarantee, ordered weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    Eventual,
    Session,
    BoundedStaleness,
    Strong,
}

impl ConsistencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::Eventual => "eventual",
            ConsistencyLevel::Session => "session",
            ConsistencyLevel::BoundedStaleness => "bounded_staleness",
            ConsistencyLevel::Strong => "strong",
        }
    }
}

/// Usage figures a community reports for capacity sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityUsageMetrics {
    pub community_id: String,
    pub active_users: i64,
    pub daily_queries: i64,
    #[serde(default)]
    pub performance_requirement: PerformanceRequirement,
    /// Expected data growth as a fraction (0.1 = 10%)
    #[serde(default)]
    pub data_growth_rate: f64,
}

/// Per-shard performance sample, most recent wins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub shard_id: String,
    pub region: String,
    pub period_ms: u64,
    pub avg_response_time_ms: f64,
    pub throughput_per_second: f64,
    /// Derived health within [0, 1]
    pub health_score: f64,
    #[serde(default)]
    pub custom_metrics: HashMap<String, f64>,
    pub sampled_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_validation() {
        assert!(CulturalContext::new("colombo_diaspora", "sinhala_buddhist", "europe")
            .validate()
            .is_ok());

        let err = CulturalContext::new("", "sinhala_buddhist", "europe")
            .validate()
            .unwrap_err();
        assert_eq!(err, ShardError::Validation("community_id is required".into()));

        assert!(CulturalContext::new("c1", "  ", "europe").validate().is_err());
    }

    #[test]
    fn test_significance_ordering() {
        assert!(SignificanceTier::Sacred > SignificanceTier::Critical);
        assert!(SignificanceTier::Critical > SignificanceTier::High);
        assert!(SignificanceTier::Medium > SignificanceTier::Low);
        assert!(ConsistencyLevel::Strong > ConsistencyLevel::BoundedStaleness);
    }

    #[test]
    fn test_requirement_multipliers() {
        assert!(
            PerformanceRequirement::RealTime.latency_multiplier()
                < PerformanceRequirement::Standard.latency_multiplier()
        );
        assert!(
            PerformanceRequirement::RealTime.capacity_multiplier()
                > PerformanceRequirement::Standard.capacity_multiplier()
        );
    }

    #[test]
    fn test_data_type_serde() {
        let json = serde_json::to_string(&CulturalDataType::CalendarEvents).unwrap();
        assert_eq!(json, "\"calendar_events\"");
        assert_eq!(CulturalDataType::CalendarEvents.to_string(), "calendar_events");
    }
}
