//! Centralized business constants for the loyalty pipeline.
//!
//! The scoring weights are a fixed business rule. Keeping them here means the
//! formula can only change through a reviewed code change, never through a
//! run configuration file.

use crate::record::Slot;

// Scoring weights ------------------------------------------------------------
pub(crate) const DEPOSIT_AMOUNT_WEIGHT: f64 = 0.01;
pub(crate) const WITHDRAWAL_AMOUNT_WEIGHT: f64 = 0.005;
pub(crate) const NET_DEPOSIT_COUNT_WEIGHT: f64 = 0.001;
pub(crate) const GAMES_PLAYED_WEIGHT: f64 = 0.2;

// Slot boundaries ------------------------------------------------------------
/// First local hour that belongs to the afternoon slot.
pub(crate) const SLOT_SPLIT_HOUR: u32 = 12;

// Bonus defaults -------------------------------------------------------------
pub(crate) const DEFAULT_BONUS_POOL: f64 = 500_000.0;
pub(crate) const DEFAULT_COHORT_SIZE: usize = 50;
/// Absolute slack allowed between the distributed total and the pool.
pub const BONUS_CONSERVATION_TOLERANCE: f64 = 1e-6;

// Reporting clock ------------------------------------------------------------
pub(crate) const MAX_REPORTING_OFFSET_MINUTES: i32 = 18 * 60;

// Default slot queries of the October 2023 reporting period.
pub(crate) const DEFAULT_SLOT_QUERIES: [(i32, u32, u32, Slot); 4] = [
    (2023, 10, 2, Slot::S1),
    (2023, 10, 16, Slot::S2),
    (2023, 10, 18, Slot::S1),
    (2023, 10, 26, Slot::S2),
];

// Logging keys ---------------------------------------------------------------
pub(crate) const LOG_TARGET: &str = "loyalty";
