//! Loyalty-point formula applied per record.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEPOSIT_AMOUNT_WEIGHT, GAMES_PLAYED_WEIGHT, LOG_TARGET, NET_DEPOSIT_COUNT_WEIGHT,
    WITHDRAWAL_AMOUNT_WEIGHT,
};
use crate::numbers::count_to_f64;
use crate::record::{ActivityRecord, NormalizedRecord};

/// Normalized record carrying its loyalty points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: NormalizedRecord,
    pub loyalty_points: f64,
}

impl ScoredRecord {
    #[must_use]
    pub const fn activity(&self) -> &ActivityRecord {
        &self.record.activity
    }
}

/// Compute loyalty points for a single activity.
///
/// ```text
/// 0.01 * deposit + 0.005 * withdrawal
///   + 0.001 * max(num_deposit - num_withdrawal, 0) + 0.2 * games_played
/// ```
#[must_use]
pub fn loyalty_points(activity: &ActivityRecord) -> f64 {
    let net_deposits = activity
        .num_deposit
        .saturating_sub(activity.num_withdrawal);
    DEPOSIT_AMOUNT_WEIGHT * activity.deposit_amount
        + WITHDRAWAL_AMOUNT_WEIGHT * activity.withdrawal_amount
        + NET_DEPOSIT_COUNT_WEIGHT * count_to_f64(net_deposits)
        + GAMES_PLAYED_WEIGHT * count_to_f64(activity.games_played)
}

/// Attach loyalty points to a normalized record.
#[must_use]
pub fn score(record: NormalizedRecord) -> ScoredRecord {
    let loyalty_points = loyalty_points(&record.activity);
    ScoredRecord {
        record,
        loyalty_points,
    }
}

/// Score a batch of normalized records, preserving order.
#[must_use]
pub fn score_all(records: Vec<NormalizedRecord>) -> Vec<ScoredRecord> {
    let scored: Vec<ScoredRecord> = records.into_iter().map(score).collect();
    log::debug!(target: LOG_TARGET, "scored {} records", scored.len());
    scored
}
