//! Error taxonomy for the loyalty pipeline.

use thiserror::Error;

/// Why a single raw record was rejected by the normalizer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MalformedReason {
    #[error("unparseable timestamp {value:?}")]
    Timestamp { value: String },
    #[error("{field} must be non-negative (got {value})")]
    NegativeAmount { field: &'static str, value: f64 },
    #[error("{field} must be finite (got {value})")]
    NonFiniteAmount { field: &'static str, value: f64 },
    #[error("{field} must be non-negative (got {value})")]
    NegativeCount { field: &'static str, value: i64 },
    #[error("player id is empty")]
    EmptyPlayerId,
}

/// Errors raised when a run configuration is invalid.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("bonus pool must be a positive finite amount (got {value})")]
    BonusPool { value: f64 },
    #[error("reporting offset must be within +/-{max} minutes (got {value})")]
    ReportingOffset { value: i32, max: i32 },
    #[error("invalid slot query {value:?}: {reason}")]
    SlotQuery { value: String, reason: String },
}

/// Failures surfaced by a pipeline run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoyaltyError {
    /// A raw record could not be normalized; the whole run is aborted.
    #[error("malformed record #{index} (player {player_id:?}): {reason}")]
    MalformedInput {
        index: usize,
        player_id: String,
        reason: MalformedReason,
    },
    /// The bonus cohort holds no loyalty points to divide the pool by.
    #[error("bonus pool cannot be distributed: cohort of {cohort_size} holds zero loyalty points")]
    UndistributablePool { cohort_size: usize },
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

impl LoyaltyError {
    /// Whether the failure only affects the bonus step.
    #[must_use]
    pub const fn is_allocation_only(&self) -> bool {
        matches!(self, Self::UndistributablePool { .. })
    }
}
