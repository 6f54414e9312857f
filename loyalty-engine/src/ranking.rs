//! Leaderboard ordering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::aggregate::{PlayerAggregate, Totals};
use crate::constants::LOG_TARGET;
use crate::record::PlayerId;

/// Player-level whole-period totals with their leaderboard position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub player_id: PlayerId,
    #[serde(flatten)]
    pub totals: Totals,
    /// 1-based position; never shared between entries.
    pub rank: usize,
}

/// Leaderboard order: loyalty points descending, games played descending,
/// then player id ascending.
#[must_use]
pub fn leaderboard_order(lhs: &PlayerAggregate, rhs: &PlayerAggregate) -> Ordering {
    rhs.totals
        .loyalty_points
        .total_cmp(&lhs.totals.loyalty_points)
        .then_with(|| rhs.totals.games_played.cmp(&lhs.totals.games_played))
        .then_with(|| lhs.player_id.cmp(&rhs.player_id))
}

/// Sort aggregates into a leaderboard and assign positional ranks `1..=n`.
#[must_use]
pub fn rank(mut aggregates: Vec<PlayerAggregate>) -> Vec<RankedEntry> {
    aggregates.sort_by(leaderboard_order);
    let leaderboard: Vec<RankedEntry> = aggregates
        .into_iter()
        .enumerate()
        .map(|(idx, aggregate)| RankedEntry {
            player_id: aggregate.player_id,
            totals: aggregate.totals,
            rank: idx + 1,
        })
        .collect();
    if let Some(leader) = leaderboard.first() {
        log::debug!(
            target: LOG_TARGET,
            "ranked {} players; leader {} with {:.3} points",
            leaderboard.len(),
            leader.player_id,
            leader.totals.loyalty_points
        );
    }
    leaderboard
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(player: &str, loyalty_points: f64, games_played: u64) -> PlayerAggregate {
        PlayerAggregate {
            player_id: player.into(),
            totals: Totals {
                loyalty_points,
                games_played,
                ..Totals::default()
            },
        }
    }

    fn order(ranked: &[RankedEntry]) -> Vec<&str> {
        ranked.iter().map(|entry| entry.player_id.as_str()).collect()
    }

    #[test]
    fn points_then_games_descending() {
        let ranked = rank(vec![
            entry("a", 10.0, 1),
            entry("b", 30.0, 0),
            entry("c", 10.0, 7),
        ]);
        assert_eq!(order(&ranked), ["b", "c", "a"]);
        let ranks: Vec<usize> = ranked.iter().map(|entry| entry.rank).collect();
        assert_eq!(ranks, [1, 2, 3]);
    }

    #[test]
    fn exact_ties_get_consecutive_ranks_by_player_id() {
        let ranked = rank(vec![
            entry("9", 5.0, 2),
            entry("top", 50.0, 2),
            entry("10", 5.0, 2),
            entry("3", 5.0, 2),
        ]);
        assert_eq!(order(&ranked), ["top", "3", "9", "10"]);
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[2].rank, 3);
        assert_eq!(ranked[3].rank, 4);
    }

    #[test]
    fn tie_break_ignores_input_order() {
        let forward = rank(vec![entry("x", 1.0, 1), entry("y", 1.0, 1)]);
        let reversed = rank(vec![entry("y", 1.0, 1), entry("x", 1.0, 1)]);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn empty_leaderboard() {
        assert!(rank(Vec::new()).is_empty());
    }
}
