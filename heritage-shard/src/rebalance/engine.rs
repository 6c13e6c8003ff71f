//! Rebalancing coordinator implementation
//!
//! Turns reported per-shard load into a remediation plan and executes
//! migrations through the injected [`MigrationExecutor`]. Plans are pure
//! computations; only `execute_migration` changes external state.

use super::ledger::{MigrationLedger, MigrationRecord};
use super::{RebalancePhase, RebalanceStatus};
use crate::collaborators::MigrationExecutor;
use crate::config::ShardingConfig;
use crate::error::{Result, ShardError};
use crate::metrics;
use crate::types::{require_field, CulturalDataType, LoadMetrics};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

const STRATEGY_BALANCED: &str = "No rebalancing needed";
const STRATEGY_LOAD_BASED: &str = "Load-based rebalancing with cultural context awareness";

/// Kind of remediation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceActionKind {
    /// Move a share of load from one shard to another
    MigrateLoad,
    /// Point routing at the new placement
    UpdateRouting,
    /// Watch access patterns while data moves
    MonitorAccessPatterns,
}

/// A single step in a rebalance plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceAction {
    pub kind: RebalanceActionKind,

    /// Donor shard for load moves
    pub source: Option<String>,

    /// Receiving shard for load moves
    pub target: Option<String>,

    /// Share of the donor's load to move
    pub fraction: f64,

    pub description: String,
}

/// A plan for rebalancing shard load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalancePlan {
    /// Unique ID for this plan
    pub plan_id: String,

    /// When the plan was created
    pub created_at: DateTime<Utc>,

    /// Whether any remediation is proposed
    pub required: bool,

    pub strategy: String,

    /// Spread between the heaviest and lightest shard in percentage points
    pub load_spread_percent: f64,

    /// Remediation steps in execution order
    pub actions: Vec<RebalanceAction>,

    /// Projected load per shard after the plan is applied
    pub expected_distribution: HashMap<String, LoadMetrics>,

    /// Estimated duration, proportional to the action count
    pub estimated_duration: Duration,

    pub risk_mitigations: Vec<String>,
}

impl RebalancePlan {
    fn new(required: bool, strategy: &str, load_spread_percent: f64) -> Self {
        Self {
            plan_id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            required,
            strategy: strategy.to_string(),
            load_spread_percent,
            actions: Vec::new(),
            expected_distribution: HashMap::new(),
            estimated_duration: Duration::ZERO,
            risk_mitigations: Vec::new(),
        }
    }

    /// Check if the plan has no actions
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// The load move, if the plan has one
    pub fn migration(&self) -> Option<&RebalanceAction> {
        self.actions
            .iter()
            .find(|a| a.kind == RebalanceActionKind::MigrateLoad)
    }
}

/// Coordinates rebalancing analysis and migration
pub struct RebalancingCoordinator {
    threshold_percent: f64,
    migration_fraction: f64,
    minutes_per_action: u64,

    /// Single-owner lock shared by analysis and migration
    lock: Mutex<()>,

    status: RwLock<RebalanceStatus>,
    ledger: MigrationLedger,
    executor: Arc<dyn MigrationExecutor>,
}

impl RebalancingCoordinator {
    /// Create a new coordinator
    pub fn new(config: &ShardingConfig, executor: Arc<dyn MigrationExecutor>) -> Self {
        Self {
            threshold_percent: config.imbalance_threshold_percent,
            migration_fraction: config.migration_fraction,
            minutes_per_action: config.minutes_per_action,
            lock: Mutex::new(()),
            status: RwLock::new(RebalanceStatus::default()),
            ledger: MigrationLedger::new(),
            executor,
        }
    }

    /// Get current rebalance status
    pub fn status(&self) -> RebalanceStatus {
        self.status.read().clone()
    }

    /// Analyze reported load, waiting for any running rebalancing to finish
    pub async fn handle_rebalancing(
        &self,
        distribution: &HashMap<String, LoadMetrics>,
    ) -> Result<RebalancePlan> {
        validate_distribution(distribution)?;
        let _guard = self.acquire().await;
        Ok(self.analyze(distribution))
    }

    /// Analyze reported load, failing with `ConcurrencyBusy` instead of waiting
    pub async fn try_handle_rebalancing(
        &self,
        distribution: &HashMap<String, LoadMetrics>,
    ) -> Result<RebalancePlan> {
        validate_distribution(distribution)?;
        let _guard = self.lock.try_lock().map_err(|_| {
            ShardError::ConcurrencyBusy("another rebalancing operation is running".to_string())
        })?;
        Ok(self.analyze(distribution))
    }

    /// Move a data type from one shard to another
    ///
    /// Safe to repeat: a completed migration is a no-op, an interrupted or
    /// failed one is attempted again.
    pub async fn execute_migration(
        &self,
        source: &str,
        target: &str,
        data_type: CulturalDataType,
    ) -> Result<MigrationRecord> {
        require_field("source shard", source)?;
        require_field("target shard", target)?;
        if source == target {
            return Err(ShardError::Validation(format!(
                "source and target shard are both {}",
                source
            )));
        }

        let _guard = self.acquire().await;

        if let Some(record) = self.ledger.get(source, target, data_type) {
            if record.is_completed() {
                metrics::record_migration(source, target, "skipped");
                info!(
                    source = %source,
                    target = %target,
                    data_type = %data_type,
                    "Migration already completed, skipping"
                );
                return Ok(record);
            }
        }

        let record = self.ledger.begin(source, target, data_type);
        metrics::record_migration(source, target, "started");
        info!(
            source = %source,
            target = %target,
            data_type = %data_type,
            attempt = record.attempts,
            "Starting migration"
        );

        let in_flight = InFlight::enter(&self.status, RebalancePhase::Migrating);
        match self.executor.move_data(source, target, data_type).await {
            Ok(moved) => {
                let completed = self
                    .ledger
                    .complete(source, target, data_type, moved)
                    .ok_or_else(|| {
                        ShardError::Internal(format!(
                            "migration {} -> {} vanished from the ledger",
                            source, target
                        ))
                    })?;
                in_flight.finish(|status| {
                    status.phase = RebalancePhase::Completed;
                    status.completed_migrations += 1;
                    status.last_error = None;
                });
                metrics::record_migration(source, target, "completed");
                info!(
                    source = %source,
                    target = %target,
                    records_moved = moved,
                    "Migration completed"
                );
                Ok(completed)
            }
            Err(e) => {
                let err = ShardError::from_dependency("migration executor", e);
                self.ledger.fail(source, target, data_type, &err.to_string());
                in_flight.finish(|status| {
                    status.phase = RebalancePhase::Failed;
                    status.failed_migrations += 1;
                    status.last_error = Some(err.to_string());
                });
                metrics::record_migration(source, target, "failed");
                warn!(
                    source = %source,
                    target = %target,
                    error = %err,
                    "Migration failed"
                );
                Err(err)
            }
        }
    }

    /// Ledger entry for a migration
    pub fn migration_record(
        &self,
        source: &str,
        target: &str,
        data_type: CulturalDataType,
    ) -> Result<MigrationRecord> {
        self.ledger.get(source, target, data_type).ok_or_else(|| {
            ShardError::NotFound(format!(
                "migration {} -> {} for {}",
                source, target, data_type
            ))
        })
    }

    async fn acquire(&self) -> MutexGuard<'_, ()> {
        let start = Instant::now();
        let guard = self.lock.lock().await;
        metrics::record_rebalance_lock_wait(start.elapsed());
        guard
    }

    fn analyze(&self, distribution: &HashMap<String, LoadMetrics>) -> RebalancePlan {
        let in_flight = InFlight::enter(&self.status, RebalancePhase::Analyzing);

        // Heaviest first, ties broken by shard id so plans are reproducible
        let mut ranked: Vec<(&String, &LoadMetrics)> = distribution.iter().collect();
        ranked.sort_by(|a, b| {
            b.1.load_percentage
                .total_cmp(&a.1.load_percentage)
                .then_with(|| a.0.cmp(b.0))
        });

        let plan = match (ranked.first(), ranked.last()) {
            (Some(&(heavy_id, heavy)), Some(&(light_id, light)))
                if heavy.load_percentage - light.load_percentage > self.threshold_percent =>
            {
                self.remediation_plan(distribution, (heavy_id, heavy), (light_id, light))
            }
            (Some(&(_, heavy)), Some(&(_, light))) => RebalancePlan::new(
                false,
                STRATEGY_BALANCED,
                heavy.load_percentage - light.load_percentage,
            ),
            _ => RebalancePlan::new(false, STRATEGY_BALANCED, 0.0),
        };

        in_flight.finish(|status| {
            status.phase = RebalancePhase::Idle;
            status.last_plan_required = Some(plan.required);
            status.last_analysis_at = Some(plan.created_at);
        });
        metrics::record_rebalance_analysis(plan.required, plan.load_spread_percent);

        if plan.required {
            info!(
                plan_id = %plan.plan_id,
                spread = plan.load_spread_percent,
                "Rebalancing required with {} actions",
                plan.action_count()
            );
        } else {
            debug!(
                shards = distribution.len(),
                spread = plan.load_spread_percent,
                "No rebalancing needed"
            );
        }
        plan
    }

    fn remediation_plan(
        &self,
        distribution: &HashMap<String, LoadMetrics>,
        (heavy_id, heavy): (&String, &LoadMetrics),
        (light_id, light): (&String, &LoadMetrics),
    ) -> RebalancePlan {
        let spread = heavy.load_percentage - light.load_percentage;
        let mut plan = RebalancePlan::new(true, STRATEGY_LOAD_BASED, spread);

        plan.actions = vec![
            RebalanceAction {
                kind: RebalanceActionKind::MigrateLoad,
                source: Some(heavy_id.clone()),
                target: Some(light_id.clone()),
                fraction: self.migration_fraction,
                description: format!(
                    "Migrate {:.0}% of load from {} to {}",
                    self.migration_fraction * 100.0,
                    heavy_id,
                    light_id
                ),
            },
            RebalanceAction {
                kind: RebalanceActionKind::UpdateRouting,
                source: None,
                target: None,
                fraction: 0.0,
                description: "Update cultural routing to balance diaspora community load"
                    .to_string(),
            },
            RebalanceAction {
                kind: RebalanceActionKind::MonitorAccessPatterns,
                source: None,
                target: None,
                fraction: 0.0,
                description: "Monitor cultural data access patterns during rebalancing"
                    .to_string(),
            },
        ];

        plan.risk_mitigations = vec![
            "Stage the migration to minimize disruption to cultural data".to_string(),
            "Preserve cultural data consistency during rebalancing".to_string(),
            "Monitor diaspora community performance during migration".to_string(),
        ];

        plan.expected_distribution = project_distribution(
            distribution,
            heavy_id,
            light_id,
            self.migration_fraction,
        );
        plan.estimated_duration =
            Duration::from_secs(self.minutes_per_action * 60 * plan.actions.len() as u64);
        plan
    }
}

/// Project load after moving part of the heaviest shard's load to the lightest
///
/// The heaviest shard gives `min(fraction * heavy, spread / 2)` points, so the
/// pair never swaps order. Connections and throughput scale with load.
pub fn project_distribution(
    distribution: &HashMap<String, LoadMetrics>,
    heavy_id: &str,
    light_id: &str,
    fraction: f64,
) -> HashMap<String, LoadMetrics> {
    let mut projected = distribution.clone();
    let (Some(heavy), Some(light)) = (distribution.get(heavy_id), distribution.get(light_id)) else {
        return projected;
    };
    if heavy_id == light_id || heavy.load_percentage <= 0.0 {
        return projected;
    }

    let moved = (fraction * heavy.load_percentage)
        .min((heavy.load_percentage - light.load_percentage) / 2.0)
        .max(0.0);

    let heavy_load = heavy.load_percentage - moved;
    let ratio = heavy_load / heavy.load_percentage;
    projected.insert(
        heavy_id.to_string(),
        LoadMetrics::new(
            heavy_load,
            (heavy.connection_count as f64 * ratio).round() as u64,
            heavy.queries_per_second * ratio,
        ),
    );

    let light_load = light.load_percentage + moved;
    let (connections, qps) = if light.load_percentage > 0.0 {
        let ratio = light_load / light.load_percentage;
        (
            light.connection_count as f64 * ratio,
            light.queries_per_second * ratio,
        )
    } else {
        // Receiver had no load, borrow the donor's per-point rates
        let per_point = moved / heavy.load_percentage;
        (
            light.connection_count as f64 + heavy.connection_count as f64 * per_point,
            light.queries_per_second + heavy.queries_per_second * per_point,
        )
    };
    projected.insert(
        light_id.to_string(),
        LoadMetrics::new(light_load, connections.round() as u64, qps),
    );

    projected
}

fn validate_distribution(distribution: &HashMap<String, LoadMetrics>) -> Result<()> {
    for (shard_id, load) in distribution {
        require_field("shard id", shard_id)?;
        if !load.load_percentage.is_finite() || load.load_percentage < 0.0 {
            return Err(ShardError::Validation(format!(
                "load percentage for shard {} must be a non-negative number, got {}",
                shard_id, load.load_percentage
            )));
        }
        if !load.queries_per_second.is_finite() || load.queries_per_second < 0.0 {
            return Err(ShardError::Validation(format!(
                "queries per second for shard {} must be a non-negative number",
                shard_id
            )));
        }
    }
    Ok(())
}

/// Marks the coordinator busy until finished or dropped
///
/// Dropping without `finish` means the future was cancelled mid-flight.
struct InFlight<'a> {
    status: &'a RwLock<RebalanceStatus>,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn enter(status: &'a RwLock<RebalanceStatus>, phase: RebalancePhase) -> Self {
        {
            let mut s = status.write();
            s.in_progress = true;
            s.phase = phase;
        }
        Self {
            status,
            finished: false,
        }
    }

    fn finish(mut self, update: impl FnOnce(&mut RebalanceStatus)) {
        let mut status = self.status.write();
        status.in_progress = false;
        update(&mut status);
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut status = self.status.write();
        status.in_progress = false;
        if status.phase == RebalancePhase::Migrating {
            status.phase = RebalancePhase::Failed;
            status.last_error = Some("migration interrupted".to_string());
        } else {
            status.phase = RebalancePhase::Idle;
        }
    }
}
