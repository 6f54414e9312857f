//! Loyalty Engine
//!
//! Platform-agnostic loyalty scoring for player activity records.
//! This crate normalizes raw activity rows, scores them, builds slot and
//! whole-period aggregates, ranks players and splits a bonus pool across the
//! top of the leaderboard, without any file or terminal I/O.

pub mod aggregate;
pub mod bonus;
pub mod config;
pub mod constants;
pub mod error;
pub mod numbers;
pub mod pipeline;
pub mod ranking;
pub mod record;
pub mod report;
pub mod score;
pub mod summary;

// Re-export commonly used types
pub use aggregate::{
    PlayerAggregate, SlotGroup, SlotKey, SlotQuery, SlotRow, Totals, aggregate, grand_total,
    merge_aggregates, player_key, player_totals, slot_group, slot_key, slot_report,
};
pub use bonus::{BonusConfig, BonusEntry, BonusTable, allocate};
pub use config::RunConfig;
pub use constants::BONUS_CONSERVATION_TOLERANCE;
pub use error::{ConfigError, LoyaltyError, MalformedReason};
pub use pipeline::LoyaltyPipeline;
pub use ranking::{RankedEntry, leaderboard_order, rank};
pub use record::{
    ActivityRecord, NormalizedRecord, PlayerId, RawRecord, ReportingClock, Slot, normalize,
    normalize_record,
};
pub use report::{BonusOutcome, LoyaltyReport, assemble_report};
pub use score::{ScoredRecord, loyalty_points, score, score_all};
pub use summary::PeriodSummary;

/// Trait for abstracting where raw activity rows come from
/// Platform-specific implementations should provide this
pub trait RecordSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load every raw row of the reporting period
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be read or decoded.
    fn load_records(&self) -> Result<Vec<RawRecord>, Self::Error>;
}

/// Trait for abstracting where assembled reports go
/// Platform-specific implementations should provide this
pub trait ReportSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Export an assembled report
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be written.
    fn export(&mut self, report: &LoyaltyReport) -> Result<(), Self::Error>;
}

/// Wires a record source, a configured pipeline and a report sink together
pub struct LoyaltyEngine<S, K>
where
    S: RecordSource,
    K: ReportSink,
{
    source: S,
    pipeline: LoyaltyPipeline,
    sink: K,
}

impl<S, K> LoyaltyEngine<S, K>
where
    S: RecordSource,
    K: ReportSink,
{
    /// Create a new engine with the provided source, pipeline and sink
    pub const fn new(source: S, pipeline: LoyaltyPipeline, sink: K) -> Self {
        Self {
            source,
            pipeline,
            sink,
        }
    }

    #[must_use]
    pub const fn pipeline(&self) -> &LoyaltyPipeline {
        &self.pipeline
    }

    /// Build a report from the source without exporting it
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be loaded or fail normalization.
    pub fn build_report(&self) -> Result<LoyaltyReport, anyhow::Error>
    where
        S::Error: Into<anyhow::Error>,
    {
        let rows = self.source.load_records().map_err(Into::into)?;
        Ok(self.pipeline.run(&rows)?)
    }

    /// Build a report and hand it to the sink
    ///
    /// The report is exported even when the bonus pool was undistributable.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, processing or exporting fails.
    pub fn run(&mut self) -> Result<LoyaltyReport, anyhow::Error>
    where
        S::Error: Into<anyhow::Error>,
        K::Error: Into<anyhow::Error>,
    {
        let report = self.build_report()?;
        self.sink.export(&report).map_err(Into::into)?;
        Ok(report)
    }

    /// Release the source and sink
    #[must_use]
    pub fn into_parts(self) -> (S, K) {
        (self.source, self.sink)
    }
}
