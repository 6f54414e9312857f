//! Grouping and summation of scored records.
//!
//! Every grouping is a key function plus an associative fold of six numeric
//! fields, so partial aggregations over disjoint partitions can be merged in
//! any order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::LOG_TARGET;
use crate::error::ConfigError;
use crate::record::{PlayerId, Slot};
use crate::score::ScoredRecord;

const SLOT_QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Summed activity metrics for one group.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub deposit_amount: f64,
    pub withdrawal_amount: f64,
    pub num_deposit: u64,
    pub num_withdrawal: u64,
    pub games_played: u64,
    pub loyalty_points: f64,
}

impl Totals {
    #[must_use]
    pub fn of(record: &ScoredRecord) -> Self {
        let activity = record.activity();
        Self {
            deposit_amount: activity.deposit_amount,
            withdrawal_amount: activity.withdrawal_amount,
            num_deposit: activity.num_deposit,
            num_withdrawal: activity.num_withdrawal,
            games_played: activity.games_played,
            loyalty_points: record.loyalty_points,
        }
    }

    /// Fold another group's sums into this one.
    pub fn absorb(&mut self, other: &Self) {
        self.deposit_amount += other.deposit_amount;
        self.withdrawal_amount += other.withdrawal_amount;
        self.num_deposit = self.num_deposit.saturating_add(other.num_deposit);
        self.num_withdrawal = self.num_withdrawal.saturating_add(other.num_withdrawal);
        self.games_played = self.games_played.saturating_add(other.games_played);
        self.loyalty_points += other.loyalty_points;
    }

    pub fn add_record(&mut self, record: &ScoredRecord) {
        self.absorb(&Self::of(record));
    }
}

/// Group `records` by `key_fn`, summing each group's metrics.
pub fn aggregate<'a, I, K, F>(records: I, key_fn: F) -> BTreeMap<K, Totals>
where
    I: IntoIterator<Item = &'a ScoredRecord>,
    K: Ord,
    F: Fn(&ScoredRecord) -> K,
{
    let mut groups: BTreeMap<K, Totals> = BTreeMap::new();
    for record in records {
        groups.entry(key_fn(record)).or_default().add_record(record);
    }
    groups
}

/// Combine two partial aggregations built over disjoint record partitions.
#[must_use]
pub fn merge_aggregates<K: Ord>(
    mut left: BTreeMap<K, Totals>,
    right: BTreeMap<K, Totals>,
) -> BTreeMap<K, Totals> {
    for (key, totals) in right {
        left.entry(key).or_default().absorb(&totals);
    }
    left
}

/// Sum of every group, equal to the sum over the ungrouped input.
#[must_use]
pub fn grand_total<'a>(groups: impl IntoIterator<Item = &'a Totals>) -> Totals {
    groups.into_iter().fold(Totals::default(), |mut acc, totals| {
        acc.absorb(totals);
        acc
    })
}

/// Whole-period grouping key.
#[must_use]
pub fn player_key(record: &ScoredRecord) -> PlayerId {
    record.activity().player_id.clone()
}

/// Composite player x date x slot grouping key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub player_id: PlayerId,
    pub date: NaiveDate,
    pub slot: Slot,
}

#[must_use]
pub fn slot_key(record: &ScoredRecord) -> SlotKey {
    SlotKey {
        player_id: player_key(record),
        date: record.record.date,
        slot: record.record.slot,
    }
}

/// A (calendar date, slot) pair requested for the slot report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub slot: Slot,
}

impl SlotQuery {
    #[must_use]
    pub const fn new(date: NaiveDate, slot: Slot) -> Self {
        Self { date, slot }
    }

    /// Whether a scored record falls on this query's calendar date and slot.
    #[must_use]
    pub fn matches(&self, record: &ScoredRecord) -> bool {
        record.record.date == self.date && record.record.slot == self.slot
    }
}

impl fmt::Display for SlotQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.date.format(SLOT_QUERY_DATE_FORMAT),
            self.slot
        )
    }
}

impl FromStr for SlotQuery {
    type Err = ConfigError;

    /// Parse `YYYY-MM-DD:S1` style queries.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::SlotQuery {
            value: s.to_string(),
            reason: reason.to_string(),
        };
        let (date_part, slot_part) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| invalid("expected DATE:SLOT"))?;
        let date = NaiveDate::parse_from_str(date_part.trim(), SLOT_QUERY_DATE_FORMAT)
            .map_err(|_| invalid("date must be YYYY-MM-DD"))?;
        let slot = slot_part
            .parse::<Slot>()
            .map_err(|()| invalid("slot must be S1 or S2"))?;
        Ok(Self { date, slot })
    }
}

/// One player's sums within a queried date and slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRow {
    pub player_id: PlayerId,
    #[serde(flatten)]
    pub totals: Totals,
    pub date: NaiveDate,
    pub slot: Slot,
}

/// All players active in one queried date and slot, player id ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotGroup {
    pub query: SlotQuery,
    pub rows: Vec<SlotRow>,
}

impl SlotGroup {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Aggregate the records of one date and slot by player.
#[must_use]
pub fn slot_group(records: &[ScoredRecord], query: SlotQuery) -> SlotGroup {
    let groups = aggregate(
        records.iter().filter(|record| query.matches(record)),
        player_key,
    );
    if groups.is_empty() {
        log::warn!(target: LOG_TARGET, "slot query {query} matched no records");
    }
    let rows = groups
        .into_iter()
        .map(|(player_id, totals)| SlotRow {
            player_id,
            totals,
            date: query.date,
            slot: query.slot,
        })
        .collect();
    SlotGroup { query, rows }
}

/// Slot groups in the order the queries were given.
#[must_use]
pub fn slot_report(records: &[ScoredRecord], queries: &[SlotQuery]) -> Vec<SlotGroup> {
    let groups: Vec<SlotGroup> = queries
        .iter()
        .map(|&query| slot_group(records, query))
        .collect();
    log::debug!(
        target: LOG_TARGET,
        "slot report: {} queries, {} rows",
        groups.len(),
        groups.iter().map(|group| group.rows.len()).sum::<usize>()
    );
    groups
}

/// One player's whole-period sums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAggregate {
    pub player_id: PlayerId,
    #[serde(flatten)]
    pub totals: Totals,
}

/// Whole-period totals per player, player id ascending.
#[must_use]
pub fn player_totals(records: &[ScoredRecord]) -> Vec<PlayerAggregate> {
    aggregate(records, player_key)
        .into_iter()
        .map(|(player_id, totals)| PlayerAggregate { player_id, totals })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ActivityRecord, NormalizedRecord};
    use crate::score::score;

    fn scored(
        player: &str,
        date: (i32, u32, u32),
        hour: u32,
        deposit: f64,
        games: u64,
    ) -> ScoredRecord {
        let timestamp = NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        score(NormalizedRecord::from_activity(ActivityRecord {
            player_id: player.into(),
            timestamp,
            deposit_amount: deposit,
            withdrawal_amount: 0.0,
            num_deposit: 1,
            num_withdrawal: 0,
            games_played: games,
        }))
    }

    fn sample() -> Vec<ScoredRecord> {
        vec![
            scored("2", (2023, 10, 2), 9, 100.0, 1),
            scored("1", (2023, 10, 2), 11, 50.0, 2),
            scored("2", (2023, 10, 2), 10, 25.0, 0),
            scored("1", (2023, 10, 2), 12, 10.0, 3),
            scored("3", (2023, 10, 3), 1, 5.0, 1),
        ]
    }

    #[test]
    fn slot_group_filters_by_date_and_slot() {
        let records = sample();
        let query = SlotQuery::new(NaiveDate::from_ymd_opt(2023, 10, 2).unwrap(), Slot::S1);
        let group = slot_group(&records, query);
        let ids: Vec<&str> = group.rows.iter().map(|row| row.player_id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
        let player_two = &group.rows[1];
        assert!((player_two.totals.deposit_amount - 125.0).abs() < 1e-12);
        assert_eq!(player_two.totals.num_deposit, 2);
        assert_eq!(player_two.slot, Slot::S1);
        assert_eq!(player_two.date, query.date);
    }

    #[test]
    fn unmatched_query_yields_empty_group() {
        let query = SlotQuery::new(NaiveDate::from_ymd_opt(2023, 11, 1).unwrap(), Slot::S2);
        let group = slot_group(&sample(), query);
        assert!(group.is_empty());
        assert_eq!(group.query, query);
    }

    #[test]
    fn slot_report_keeps_query_order() {
        let records = sample();
        let queries = [
            "2023-10-03:S1".parse::<SlotQuery>().unwrap(),
            "2023-10-02:S2".parse::<SlotQuery>().unwrap(),
        ];
        let report = slot_report(&records, &queries);
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].query, queries[0]);
        assert_eq!(report[0].rows[0].player_id.as_str(), "3");
        assert_eq!(report[1].rows[0].player_id.as_str(), "1");
        assert_eq!(report[1].rows[0].totals.games_played, 3);
    }

    #[test]
    fn grouping_preserves_totals() {
        let records = sample();
        let expected: f64 = records.iter().map(|record| record.loyalty_points).sum();
        for groups in [
            grand_total(aggregate(&records, player_key).values()),
            grand_total(aggregate(&records, slot_key).values()),
        ] {
            assert!((groups.loyalty_points - expected).abs() < 1e-9);
            assert_eq!(groups.num_deposit, 5);
            assert_eq!(groups.games_played, 7);
        }
    }

    #[test]
    fn merged_partitions_match_single_pass() {
        let records = sample();
        let (left, right) = records.split_at(2);
        let merged = merge_aggregates(aggregate(left, player_key), aggregate(right, player_key));
        let single = aggregate(&records, player_key);
        assert_eq!(merged.len(), single.len());
        for (key, totals) in &single {
            let other = merged.get(key).expect("merged key");
            assert_eq!(other.games_played, totals.games_played);
            assert!((other.loyalty_points - totals.loyalty_points).abs() < 1e-9);
        }
    }

    #[test]
    fn player_totals_span_whole_period() {
        let totals = player_totals(&sample());
        let ids: Vec<&str> = totals.iter().map(|agg| agg.player_id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(totals[0].totals.games_played, 5);
        assert!((totals[0].totals.deposit_amount - 60.0).abs() < 1e-12);
    }

    #[test]
    fn slot_query_parses_and_displays() {
        let query: SlotQuery = " 2023-10-16:S2 ".parse().unwrap();
        assert_eq!(query.to_string(), "2023-10-16:S2");
        assert!(matches!(
            "2023-10-16".parse::<SlotQuery>(),
            Err(ConfigError::SlotQuery { .. })
        ));
        assert!("2023-13-01:S1".parse::<SlotQuery>().is_err());
        assert!("2023-10-01:S9".parse::<SlotQuery>().is_err());
    }
}
