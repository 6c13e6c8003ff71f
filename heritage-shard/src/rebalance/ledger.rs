//! Migration ledger
//!
//! A migration is recorded as `Started` before any data moves and as
//! `Completed` only after the executor returns, so a retry can tell
//! finished work from interrupted work.

use crate::types::CulturalDataType;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// State of a migration between two shards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    /// Data move began and has not been confirmed
    Started,
    /// Executor confirmed the move
    Completed,
    /// Executor reported an error
    Failed,
}

/// Ledger entry for one (source, target, data type) migration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub migration_id: String,
    pub source: String,
    pub target: String,
    pub data_type: CulturalDataType,
    pub state: MigrationState,
    /// Number of times the move was attempted
    pub attempts: u32,
    pub records_moved: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl MigrationRecord {
    pub fn is_completed(&self) -> bool {
        self.state == MigrationState::Completed
    }
}

/// In-memory migration ledger
#[derive(Debug, Default)]
pub struct MigrationLedger {
    records: RwLock<HashMap<String, MigrationRecord>>,
}

impl MigrationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(source: &str, target: &str, data_type: CulturalDataType) -> String {
        format!("{}->{}:{}", source, target, data_type)
    }

    /// Look up a migration
    pub fn get(&self, source: &str, target: &str, data_type: CulturalDataType) -> Option<MigrationRecord> {
        self.records
            .read()
            .get(&Self::key(source, target, data_type))
            .cloned()
    }

    /// Record a new attempt. Earlier `Started` or `Failed` entries are reused.
    pub fn begin(&self, source: &str, target: &str, data_type: CulturalDataType) -> MigrationRecord {
        let mut records = self.records.write();
        let record = records
            .entry(Self::key(source, target, data_type))
            .or_insert_with(|| MigrationRecord {
                migration_id: uuid::Uuid::new_v4().to_string(),
                source: source.to_string(),
                target: target.to_string(),
                data_type,
                state: MigrationState::Started,
                attempts: 0,
                records_moved: 0,
                started_at: Utc::now(),
                completed_at: None,
                last_error: None,
            });

        record.state = MigrationState::Started;
        record.attempts += 1;
        record.clone()
    }

    /// Mark a migration as completed
    pub fn complete(
        &self,
        source: &str,
        target: &str,
        data_type: CulturalDataType,
        records_moved: u64,
    ) -> Option<MigrationRecord> {
        let mut records = self.records.write();
        let record = records.get_mut(&Self::key(source, target, data_type))?;
        record.state = MigrationState::Completed;
        record.records_moved += records_moved;
        record.completed_at = Some(Utc::now());
        record.last_error = None;
        Some(record.clone())
    }

    /// Mark a migration attempt as failed
    pub fn fail(&self, source: &str, target: &str, data_type: CulturalDataType, error: &str) {
        if let Some(record) = self
            .records
            .write()
            .get_mut(&Self::key(source, target, data_type))
        {
            record.state = MigrationState::Failed;
            record.last_error = Some(error.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_then_complete() {
        let ledger = MigrationLedger::new();
        let dt = CulturalDataType::CalendarEvents;

        let started = ledger.begin("s1", "s2", dt);
        assert_eq!(started.state, MigrationState::Started);
        assert_eq!(started.attempts, 1);

        let done = ledger.complete("s1", "s2", dt, 120).unwrap();
        assert!(done.is_completed());
        assert_eq!(done.records_moved, 120);
        assert!(done.completed_at.is_some());
        assert_eq!(done.migration_id, started.migration_id);
    }

    #[test]
    fn test_failed_attempt_is_reused() {
        let ledger = MigrationLedger::new();
        let dt = CulturalDataType::BusinessDirectory;

        ledger.begin("s1", "s2", dt);
        ledger.fail("s1", "s2", dt, "disk full");
        let record = ledger.get("s1", "s2", dt).unwrap();
        assert_eq!(record.state, MigrationState::Failed);
        assert_eq!(record.last_error.as_deref(), Some("disk full"));

        let retry = ledger.begin("s1", "s2", dt);
        assert_eq!(retry.attempts, 2);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_direction_and_type_are_distinct() {
        let ledger = MigrationLedger::new();
        ledger.begin("s1", "s2", CulturalDataType::CalendarEvents);

        assert!(ledger.get("s2", "s1", CulturalDataType::CalendarEvents).is_none());
        assert!(ledger.get("s1", "s2", CulturalDataType::EventSignups).is_none());
        assert!(ledger.complete("s2", "s1", CulturalDataType::CalendarEvents, 1).is_none());
    }
}
