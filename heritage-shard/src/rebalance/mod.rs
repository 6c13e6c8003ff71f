//! Shard rebalancing module
//!
//! Detects load imbalance across reported shards, proposes remediation
//! plans and executes data migrations between shard pairs. Analysis and
//! migration share one lock, so at most one of them runs at a time.

mod engine;
mod ledger;

pub use engine::{RebalanceAction, RebalanceActionKind, RebalancePlan, RebalancingCoordinator};
pub use ledger::{MigrationLedger, MigrationRecord, MigrationState};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of the rebalancing coordinator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebalanceStatus {
    /// Whether an analysis or migration currently holds the lock
    pub in_progress: bool,

    /// Current phase
    pub phase: RebalancePhase,

    /// Number of completed migrations since startup
    pub completed_migrations: usize,

    /// Number of failed migration attempts since startup
    pub failed_migrations: usize,

    /// Whether the most recent analysis required rebalancing
    pub last_plan_required: Option<bool>,

    /// When the most recent analysis finished
    pub last_analysis_at: Option<DateTime<Utc>>,

    /// Last error message if any
    pub last_error: Option<String>,
}

/// Phase of the rebalancing process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalancePhase {
    /// Nothing running
    #[default]
    Idle,
    /// Computing a plan from reported load
    Analyzing,
    /// Moving data between shards
    Migrating,
    /// Last migration completed
    Completed,
    /// Last migration failed or was interrupted
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebalance_status_default() {
        let status = RebalanceStatus::default();
        assert!(!status.in_progress);
        assert_eq!(status.phase, RebalancePhase::Idle);
        assert_eq!(status.completed_migrations, 0);
        assert!(status.last_plan_required.is_none());
    }
}
