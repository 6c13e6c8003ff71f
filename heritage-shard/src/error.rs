//! Sharding service error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during shard routing and rebalancing operations
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShardError {
    /// Missing or invalid input. Fails fast, never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown shard or migration reference
    #[error("Not found: {0}")]
    NotFound(String),

    /// Telemetry, configuration, load balancer or storage unreachable
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// Another rebalancing operation holds the lock
    #[error("Rebalancing busy: {0}")]
    ConcurrencyBusy(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShardError {
    /// Get the error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            ShardError::Validation(_) => "validation",
            ShardError::NotFound(_) => "not_found",
            ShardError::Dependency(_) => "dependency",
            ShardError::ConcurrencyBusy(_) => "concurrency_busy",
            ShardError::Cancelled(_) => "cancelled",
            ShardError::Config(_) => "config",
            ShardError::Internal(_) => "internal",
        }
    }

    /// Whether a caller may reasonably retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShardError::Dependency(_) | ShardError::ConcurrencyBusy(_) | ShardError::Cancelled(_)
        )
    }

    /// Attribute a collaborator failure to the dependency that produced it
    pub(crate) fn from_dependency(component: &str, err: ShardError) -> ShardError {
        match err {
            ShardError::Dependency(_) | ShardError::Cancelled(_) => err,
            other => ShardError::Dependency(format!("{} unreachable: {}", component, other)),
        }
    }
}

impl From<toml::de::Error> for ShardError {
    fn from(err: toml::de::Error) -> Self {
        ShardError::Config(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ShardError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ShardError::Dependency(format!("timed out: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, ShardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_labels() {
        assert_eq!(ShardError::Validation("x".into()).error_type(), "validation");
        assert_eq!(ShardError::NotFound("x".into()).error_type(), "not_found");
        assert_eq!(ShardError::Dependency("x".into()).error_type(), "dependency");
        assert_eq!(
            ShardError::ConcurrencyBusy("x".into()).error_type(),
            "concurrency_busy"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(ShardError::Dependency("telemetry".into()).is_retryable());
        assert!(ShardError::ConcurrencyBusy("rebalance".into()).is_retryable());
        assert!(!ShardError::Validation("empty".into()).is_retryable());
        assert!(!ShardError::NotFound("shard".into()).is_retryable());
    }

    #[test]
    fn test_from_dependency_wraps() {
        let wrapped = ShardError::from_dependency("telemetry", ShardError::Internal("eof".into()));
        assert_eq!(
            wrapped,
            ShardError::Dependency("telemetry unreachable: Internal error: eof".into())
        );

        let kept = ShardError::from_dependency("telemetry", ShardError::Dependency("down".into()));
        assert_eq!(kept, ShardError::Dependency("down".into()));
    }

    #[test]
    fn test_display() {
        let err = ShardError::Validation("community_id is empty".into());
        assert_eq!(err.to_string(), "Validation error: community_id is empty");
    }
}
