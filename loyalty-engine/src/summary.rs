//! Period-level averages over scored activity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::aggregate::grand_total;
use crate::numbers::{count_to_f64, len_to_f64};
use crate::ranking::RankedEntry;
use crate::score::ScoredRecord;

/// Headline figures for one reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub record_count: usize,
    pub player_count: usize,
    /// Distinct calendar dates with any activity.
    pub active_days: usize,
    pub total_loyalty_points: f64,
    /// Mean deposit amount per activity record.
    pub avg_deposit: Option<f64>,
    /// Mean whole-period deposit total per player.
    pub avg_deposit_per_player: Option<f64>,
    /// Mean whole-period games played per player.
    pub avg_games_per_player: Option<f64>,
}

impl PeriodSummary {
    /// Summarize a period from its scored records and the leaderboard built
    /// over them. Per-player figures are read off the leaderboard.
    #[must_use]
    pub fn from_leaderboard(records: &[ScoredRecord], leaderboard: &[RankedEntry]) -> Self {
        let totals = grand_total(leaderboard.iter().map(|entry| &entry.totals));
        let record_count = records.len();
        let player_count = leaderboard.len();
        let active_days = records
            .iter()
            .map(|record| record.record.date)
            .collect::<BTreeSet<_>>()
            .len();
        let per_record = |sum: f64| (record_count > 0).then(|| sum / len_to_f64(record_count));
        let per_player_avg = |sum: f64| (player_count > 0).then(|| sum / len_to_f64(player_count));
        Self {
            record_count,
            player_count,
            active_days,
            total_loyalty_points: totals.loyalty_points,
            avg_deposit: per_record(totals.deposit_amount),
            avg_deposit_per_player: per_player_avg(totals.deposit_amount),
            avg_games_per_player: per_player_avg(count_to_f64(totals.games_played)),
        }
    }
}
