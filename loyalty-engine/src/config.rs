//! Run configuration shared by the pipeline and its runners.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregate::SlotQuery;
use crate::bonus::BonusConfig;
use crate::constants::DEFAULT_SLOT_QUERIES;
use crate::error::ConfigError;
use crate::record::ReportingClock;

/// Everything a pipeline run needs beyond the records themselves.
///
/// Every field has a default, so `{}` is a complete configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Slot views to include in the slot report, in output order.
    #[serde(default = "RunConfig::default_slot_queries")]
    pub slot_queries: Vec<SlotQuery>,
    #[serde(default)]
    pub bonus: BonusConfig,
    /// Offset of the reporting time zone from UTC, in minutes.
    #[serde(default)]
    pub reporting_offset_minutes: i32,
}

impl RunConfig {
    #[must_use]
    pub fn default_slot_queries() -> Vec<SlotQuery> {
        DEFAULT_SLOT_QUERIES
            .iter()
            .filter_map(|&(year, month, day, slot)| {
                NaiveDate::from_ymd_opt(year, month, day).map(|date| SlotQuery::new(date, slot))
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns `ConfigError` when the bonus pool or the reporting offset is
    /// out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bonus.validate()?;
        self.clock().map(|_| ())
    }

    /// Clock that maps raw timestamps onto reporting-time calendar days.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReportingOffset`] for an offset beyond 18 hours.
    pub fn clock(&self) -> Result<ReportingClock, ConfigError> {
        ReportingClock::from_offset_minutes(self.reporting_offset_minutes)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            slot_queries: Self::default_slot_queries(),
            bonus: BonusConfig::default(),
            reporting_offset_minutes: 0,
        }
    }
}
