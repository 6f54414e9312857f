//! Final packaging of a pipeline run.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::aggregate::SlotGroup;
use crate::bonus::BonusTable;
use crate::error::LoyaltyError;
use crate::ranking::RankedEntry;
use crate::summary::PeriodSummary;

/// Result of the bonus step as carried by a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BonusOutcome {
    Allocated(BonusTable),
    /// The cohort held no loyalty points; nothing was handed out.
    Undistributable { pool: f64, cohort_size: usize },
}

impl BonusOutcome {
    /// Fold an allocation result into an outcome.
    ///
    /// # Errors
    ///
    /// Passes through every error other than
    /// [`LoyaltyError::UndistributablePool`].
    pub fn from_allocation(
        allocation: Result<BonusTable, LoyaltyError>,
        pool: f64,
    ) -> Result<Self, LoyaltyError> {
        match allocation {
            Ok(table) => Ok(Self::Allocated(table)),
            Err(LoyaltyError::UndistributablePool { cohort_size }) => {
                Ok(Self::Undistributable { pool, cohort_size })
            }
            Err(err) => Err(err),
        }
    }

    #[must_use]
    pub const fn table(&self) -> Option<&BonusTable> {
        match self {
            Self::Allocated(table) => Some(table),
            Self::Undistributable { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_allocated(&self) -> bool {
        matches!(self, Self::Allocated(_))
    }

    /// The allocation failure this outcome records, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<LoyaltyError> {
        match *self {
            Self::Allocated(_) => None,
            Self::Undistributable { cohort_size, .. } => {
                Some(LoyaltyError::UndistributablePool { cohort_size })
            }
        }
    }
}

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyReport {
    pub slot_report: Vec<SlotGroup>,
    pub leaderboard: Vec<RankedEntry>,
    pub bonus: BonusOutcome,
    pub summary: PeriodSummary,
}

impl LoyaltyReport {
    /// Lowercase hex SHA-256 of the report's JSON serialization.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the report cannot be encoded.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let canonical = serde_json::to_vec(self)?;
        Ok(format!("{:x}", Sha256::digest(&canonical)))
    }
}

/// Package the stage outputs without further computation.
#[must_use]
pub const fn assemble_report(
    slot_report: Vec<SlotGroup>,
    leaderboard: Vec<RankedEntry>,
    bonus: BonusOutcome,
    summary: PeriodSummary,
) -> LoyaltyReport {
    LoyaltyReport {
        slot_report,
        leaderboard,
        bonus,
        summary,
    }
}
