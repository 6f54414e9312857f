//! End-to-end run over one batch of raw records.

use crate::aggregate::{player_totals, slot_report};
use crate::bonus::allocate;
use crate::config::RunConfig;
use crate::constants::LOG_TARGET;
use crate::error::LoyaltyError;
use crate::ranking::rank;
use crate::record::{RawRecord, ReportingClock, normalize};
use crate::report::{BonusOutcome, LoyaltyReport, assemble_report};
use crate::score::score_all;
use crate::summary::PeriodSummary;

/// A validated run configuration ready to process record batches.
#[derive(Debug, Clone, PartialEq)]
pub struct LoyaltyPipeline {
    config: RunConfig,
    clock: ReportingClock,
}

impl LoyaltyPipeline {
    /// # Errors
    ///
    /// Returns [`LoyaltyError::InvalidConfig`] before any record is touched
    /// when the configuration is out of range.
    pub fn new(config: RunConfig) -> Result<Self, LoyaltyError> {
        config.validate()?;
        let clock = config.clock()?;
        Ok(Self { config, clock })
    }

    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Normalize, score, aggregate, rank, allocate and assemble.
    ///
    /// An undistributable pool does not fail the run; it is recorded in the
    /// report's bonus outcome.
    ///
    /// # Errors
    ///
    /// Returns [`LoyaltyError::MalformedInput`] for the first record that
    /// fails normalization.
    pub fn run(&self, rows: &[RawRecord]) -> Result<LoyaltyReport, LoyaltyError> {
        let scored = score_all(normalize(rows, &self.clock)?);
        let slots = slot_report(&scored, &self.config.slot_queries);
        let leaderboard = rank(player_totals(&scored));
        let bonus = BonusOutcome::from_allocation(
            allocate(&leaderboard, &self.config.bonus),
            self.config.bonus.pool,
        )?;
        let summary = PeriodSummary::from_leaderboard(&scored, &leaderboard);
        log::info!(
            target: LOG_TARGET,
            "processed {} records for {} players across {} active days (bonus {})",
            summary.record_count,
            summary.player_count,
            summary.active_days,
            if bonus.is_allocated() {
                "allocated"
            } else {
                "undistributable"
            }
        );
        Ok(assemble_report(slots, leaderboard, bonus, summary))
    }
}
