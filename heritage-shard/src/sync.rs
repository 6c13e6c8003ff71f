//! Cross-region synchronization planning
//!
//! Produces a four-phase replication plan for a cultural event. The
//! consistency level rises with the event's significance, and the most
//! significant events are prioritized with a shorter time estimate.

use crate::config::ShardingConfig;
use crate::error::{Result, ShardError};
use crate::metrics;
use crate::types::{require_field, ConsistencyLevel, SignificanceTier};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::info;

/// Event data to replicate across regions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub event_id: String,
    pub event_type: String,
    pub target_regions: Vec<String>,
    #[serde(default)]
    pub significance: SignificanceTier,
}

/// Phase of a synchronization plan, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Prepare,
    ValidateSignificance,
    Replicate,
    VerifyIntegrity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStep {
    pub phase: SyncPhase,
    pub description: String,
}

/// Ordered synchronization plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPlan {
    pub event_id: String,
    pub steps: Vec<SyncStep>,
    pub estimated_sync_time: Duration,
    pub consistency_level: ConsistencyLevel,
    /// Distinct target regions in request order
    pub target_regions: Vec<String>,
}

/// Consistency level required for an event of the given significance
pub fn consistency_for(significance: SignificanceTier) -> ConsistencyLevel {
    match significance {
        SignificanceTier::Sacred | SignificanceTier::Critical => ConsistencyLevel::Strong,
        SignificanceTier::High => ConsistencyLevel::BoundedStaleness,
        SignificanceTier::Medium => ConsistencyLevel::Session,
        SignificanceTier::Low => ConsistencyLevel::Eventual,
    }
}

fn significance_multiplier(significance: SignificanceTier) -> f64 {
    match significance {
        SignificanceTier::Sacred | SignificanceTier::Critical => 0.5,
        _ => 1.0,
    }
}

/// Plans cross-region replication of cultural events
#[derive(Debug, Clone)]
pub struct CrossRegionSynchronizer {
    base_secs: f64,
    region_factor: f64,
}

impl CrossRegionSynchronizer {
    pub fn new(base_secs: f64, region_factor: f64) -> Self {
        Self {
            base_secs,
            region_factor,
        }
    }

    pub fn from_config(config: &ShardingConfig) -> Self {
        Self::new(config.sync_base_secs, config.sync_region_factor)
    }

    /// Build the synchronization plan for an event
    pub fn plan_synchronization(&self, request: &SyncRequest) -> Result<SyncPlan> {
        require_field("event_id", &request.event_id)?;
        if request.target_regions.is_empty() {
            return Err(ShardError::Validation(format!(
                "event {} has no target regions",
                request.event_id
            )));
        }

        let mut seen = HashSet::new();
        let mut regions = Vec::with_capacity(request.target_regions.len());
        for region in &request.target_regions {
            require_field("target region", region)?;
            if seen.insert(region.as_str()) {
                regions.push(region.clone());
            }
        }

        let consistency_level = consistency_for(request.significance);
        let estimated_sync_time = self.estimate(regions.len(), request.significance);
        let event_type = if request.event_type.trim().is_empty() {
            "cultural event"
        } else {
            request.event_type.as_str()
        };

        let steps = vec![
            SyncStep {
                phase: SyncPhase::Prepare,
                description: format!("Prepare {} data for synchronization", event_type),
            },
            SyncStep {
                phase: SyncPhase::ValidateSignificance,
                description: "Validate cultural significance and community context".to_string(),
            },
            SyncStep {
                phase: SyncPhase::Replicate,
                description: format!(
                    "Replicate to {} regions with {} consistency checks",
                    regions.len(),
                    consistency_level.as_str()
                ),
            },
            SyncStep {
                phase: SyncPhase::VerifyIntegrity,
                description: "Verify data integrity across all target regions".to_string(),
            },
        ];

        metrics::record_sync_plan(consistency_level, regions.len());
        info!(
            event_id = %request.event_id,
            event_type = %event_type,
            regions = regions.len(),
            consistency = consistency_level.as_str(),
            "Generated cross-region synchronization plan"
        );

        Ok(SyncPlan {
            event_id: request.event_id.clone(),
            steps,
            estimated_sync_time,
            consistency_level,
            target_regions: regions,
        })
    }

    // base × (regions × factor) × significance, rounded to whole milliseconds
    fn estimate(&self, region_count: usize, significance: SignificanceTier) -> Duration {
        let secs = self.base_secs
            * (region_count as f64 * self.region_factor)
            * significance_multiplier(significance);
        Duration::from_millis((secs * 1000.0).round().max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(significance: SignificanceTier, regions: &[&str]) -> SyncRequest {
        SyncRequest {
            event_id: "vesak-2026".to_string(),
            event_type: "Vesak Poya".to_string(),
            target_regions: regions.iter().map(|r| r.to_string()).collect(),
            significance,
        }
    }

    fn synchronizer() -> CrossRegionSynchronizer {
        CrossRegionSynchronizer::from_config(&ShardingConfig::default())
    }

    #[test]
    fn test_consistency_mapping() {
        assert_eq!(consistency_for(SignificanceTier::Sacred), ConsistencyLevel::Strong);
        assert_eq!(consistency_for(SignificanceTier::Critical), ConsistencyLevel::Strong);
        assert_eq!(
            consistency_for(SignificanceTier::High),
            ConsistencyLevel::BoundedStaleness
        );
        assert_eq!(consistency_for(SignificanceTier::Medium), ConsistencyLevel::Session);
        assert_eq!(consistency_for(SignificanceTier::Low), ConsistencyLevel::Eventual);
        assert_eq!(
            consistency_for(SignificanceTier::default()),
            ConsistencyLevel::Eventual
        );
    }

    #[test]
    fn test_consistency_monotonic_in_significance() {
        let tiers = [
            SignificanceTier::Low,
            SignificanceTier::Medium,
            SignificanceTier::High,
            SignificanceTier::Critical,
            SignificanceTier::Sacred,
        ];
        for pair in tiers.windows(2) {
            assert!(consistency_for(pair[0]) <= consistency_for(pair[1]));
        }
    }

    #[test]
    fn test_sacred_three_regions() {
        let plan = synchronizer()
            .plan_synchronization(&request(SignificanceTier::Sacred, &["r1", "r2", "r3"]))
            .unwrap();

        assert_eq!(plan.estimated_sync_time, Duration::from_millis(4500));
        assert_eq!(plan.consistency_level, ConsistencyLevel::Strong);
        assert_eq!(plan.target_regions, vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn test_four_phases_in_order() {
        let plan = synchronizer()
            .plan_synchronization(&request(SignificanceTier::Medium, &["europe"]))
            .unwrap();

        let phases: Vec<_> = plan.steps.iter().map(|s| s.phase).collect();
        assert_eq!(
            phases,
            vec![
                SyncPhase::Prepare,
                SyncPhase::ValidateSignificance,
                SyncPhase::Replicate,
                SyncPhase::VerifyIntegrity,
            ]
        );
        assert!(plan.steps[0].description.contains("Vesak Poya"));
        assert_eq!(plan.estimated_sync_time, Duration::from_millis(3000));
    }

    #[test]
    fn test_duplicate_regions_counted_once() {
        let plan = synchronizer()
            .plan_synchronization(&request(SignificanceTier::High, &["europe", "oceania", "europe"]))
            .unwrap();
        assert_eq!(plan.target_regions.len(), 2);
        assert_eq!(plan.estimated_sync_time, Duration::from_millis(6000));
    }

    #[test]
    fn test_empty_targets_rejected() {
        let err = synchronizer()
            .plan_synchronization(&request(SignificanceTier::Sacred, &[]))
            .unwrap_err();
        assert!(matches!(err, ShardError::Validation(_)));
    }

    #[test]
    fn test_missing_event_id_rejected() {
        let mut req = request(SignificanceTier::Low, &["europe"]);
        req.event_id = "  ".to_string();
        let err = synchronizer().plan_synchronization(&req).unwrap_err();
        assert!(matches!(err, ShardError::Validation(_)));
    }
}
