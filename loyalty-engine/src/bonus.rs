//! Proportional bonus allocation across the top of the leaderboard.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BONUS_POOL, DEFAULT_COHORT_SIZE, LOG_TARGET};
use crate::error::{ConfigError, LoyaltyError};
use crate::numbers::stable_sum;
use crate::ranking::RankedEntry;
use crate::record::PlayerId;

/// Pool size and cohort width for one allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusConfig {
    #[serde(default = "BonusConfig::default_pool")]
    pub pool: f64,
    #[serde(default = "BonusConfig::default_cohort_size")]
    pub cohort_size: usize,
}

impl BonusConfig {
    const fn default_pool() -> f64 {
        DEFAULT_BONUS_POOL
    }

    const fn default_cohort_size() -> usize {
        DEFAULT_COHORT_SIZE
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::BonusPool`] unless the pool is positive and finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.pool.is_finite() || self.pool <= 0.0 {
            return Err(ConfigError::BonusPool { value: self.pool });
        }
        Ok(())
    }
}

impl Default for BonusConfig {
    fn default() -> Self {
        Self {
            pool: Self::default_pool(),
            cohort_size: Self::default_cohort_size(),
        }
    }
}

/// One cohort member's share of the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusEntry {
    pub player_id: PlayerId,
    pub rank: usize,
    pub loyalty_points: f64,
    pub bonus_amount: f64,
}

/// Allocation result for the whole cohort, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusTable {
    pub pool: f64,
    pub cohort_points: f64,
    pub entries: Vec<BonusEntry>,
}

impl BonusTable {
    /// Total handed out; equals the pool up to float rounding.
    #[must_use]
    pub fn distributed(&self) -> f64 {
        stable_sum(self.entries.iter().map(|entry| entry.bonus_amount))
    }
}

/// Split `config.pool` across the top `config.cohort_size` leaderboard entries
/// in proportion to their loyalty points.
///
/// A leaderboard shorter than the cohort narrows the cohort.
///
/// # Errors
///
/// Returns [`LoyaltyError::InvalidConfig`] for a non-positive pool and
/// [`LoyaltyError::UndistributablePool`] when the cohort holds no points.
pub fn allocate(
    leaderboard: &[RankedEntry],
    config: &BonusConfig,
) -> Result<BonusTable, LoyaltyError> {
    config.validate()?;
    let cohort = &leaderboard[..config.cohort_size.min(leaderboard.len())];
    let cohort_points = stable_sum(cohort.iter().map(|entry| entry.totals.loyalty_points));
    if !cohort_points.is_finite() || cohort_points <= 0.0 {
        log::warn!(
            target: LOG_TARGET,
            "bonus pool {:.2} undistributable across {} players",
            config.pool,
            cohort.len()
        );
        return Err(LoyaltyError::UndistributablePool {
            cohort_size: cohort.len(),
        });
    }

    let entries: Vec<BonusEntry> = cohort
        .iter()
        .map(|entry| BonusEntry {
            player_id: entry.player_id.clone(),
            rank: entry.rank,
            loyalty_points: entry.totals.loyalty_points,
            bonus_amount: entry.totals.loyalty_points / cohort_points * config.pool,
        })
        .collect();
    let table = BonusTable {
        pool: config.pool,
        cohort_points,
        entries,
    };
    log::debug!(
        target: LOG_TARGET,
        "allocated {:.2} across {} players (cohort points {:.3}, residual {:e})",
        config.pool,
        table.entries.len(),
        cohort_points,
        table.distributed() - config.pool
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Totals;
    use crate::constants::BONUS_CONSERVATION_TOLERANCE;

    fn ranked(points: &[f64]) -> Vec<RankedEntry> {
        points
            .iter()
            .enumerate()
            .map(|(idx, &loyalty_points)| RankedEntry {
                player_id: PlayerId::new(format!("p{idx}")),
                totals: Totals {
                    loyalty_points,
                    ..Totals::default()
                },
                rank: idx + 1,
            })
            .collect()
    }

    fn config(pool: f64, cohort_size: usize) -> BonusConfig {
        BonusConfig { pool, cohort_size }
    }

    #[test]
    fn splits_pool_proportionally() {
        let table = allocate(&ranked(&[300.0, 100.0]), &config(500_000.0, 50)).unwrap();
        assert_eq!(table.entries.len(), 2);
        assert!((table.entries[0].bonus_amount - 375_000.0).abs() < 1e-6);
        assert!((table.entries[1].bonus_amount - 125_000.0).abs() < 1e-6);
        assert!((table.cohort_points - 400.0).abs() < 1e-12);
    }

    #[test]
    fn only_cohort_members_receive_bonus() {
        let leaderboard = ranked(&[40.0, 30.0, 20.0, 10.0]);
        let table = allocate(&leaderboard, &config(1_000.0, 2)).unwrap();
        let ids: Vec<&str> = table
            .entries
            .iter()
            .map(|entry| entry.player_id.as_str())
            .collect();
        assert_eq!(ids, ["p0", "p1"]);
        assert!((table.entries[0].bonus_amount - 1_000.0 * 40.0 / 70.0).abs() < 1e-9);
        assert!((table.distributed() - 1_000.0).abs() < BONUS_CONSERVATION_TOLERANCE);
    }

    #[test]
    fn zero_score_member_receives_zero() {
        let table = allocate(&ranked(&[5.0, 0.0]), &config(100.0, 50)).unwrap();
        assert!((table.entries[0].bonus_amount - 100.0).abs() < 1e-12);
        assert!(table.entries[1].bonus_amount.abs() < f64::EPSILON);
    }

    #[test]
    fn all_zero_cohort_is_undistributable() {
        let err = allocate(&ranked(&[0.0, 0.0, 0.0]), &BonusConfig::default()).unwrap_err();
        assert_eq!(err, LoyaltyError::UndistributablePool { cohort_size: 3 });
    }

    #[test]
    fn empty_leaderboard_is_undistributable() {
        let err = allocate(&[], &BonusConfig::default()).unwrap_err();
        assert_eq!(err, LoyaltyError::UndistributablePool { cohort_size: 0 });
    }

    #[test]
    fn zero_width_cohort_is_undistributable() {
        let err = allocate(&ranked(&[1.0]), &config(10.0, 0)).unwrap_err();
        assert_eq!(err, LoyaltyError::UndistributablePool { cohort_size: 0 });
    }

    #[test]
    fn invalid_pool_is_rejected_before_allocation() {
        for pool in [0.0, -10.0, f64::INFINITY, f64::NAN] {
            let err = allocate(&ranked(&[1.0]), &config(pool, 1)).unwrap_err();
            assert!(matches!(
                err,
                LoyaltyError::InvalidConfig(ConfigError::BonusPool { .. })
            ));
        }
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let parsed: BonusConfig = serde_json::from_str(r#"{"pool": 1000}"#).unwrap();
        assert_eq!(parsed, config(1_000.0, 50));
        assert_eq!(BonusConfig::default(), config(500_000.0, 50));
    }
}
