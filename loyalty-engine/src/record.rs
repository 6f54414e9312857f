//! Raw ingestion rows, typed activity records and the record normalizer.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::constants::{LOG_TARGET, MAX_REPORTING_OFFSET_MINUTES, SLOT_SPLIT_HOUR};
use crate::error::{ConfigError, LoyaltyError, MalformedReason};
use crate::numbers::non_negative_count;

const NAIVE_TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];
const OFFSET_TIMESTAMP_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%z",
    "%Y-%m-%dT%H:%M%z",
];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Opaque player identifier.
///
/// Ordering is natural: purely numeric ids compare by value and sort ahead of
/// textual ids, textual ids compare lexicographically. Ties between numeric
/// spellings (`"007"` vs `"7"`) fall back to the raw text so the order stays
/// total.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric_digits(&self) -> Option<&str> {
        let raw = self.0.as_str();
        (!raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()))
            .then(|| raw.trim_start_matches('0'))
    }
}

impl Ord for PlayerId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric_digits(), other.numeric_digits()) {
            (Some(lhs), Some(rhs)) => lhs
                .len()
                .cmp(&rhs.len())
                .then_with(|| lhs.cmp(rhs))
                .then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for PlayerId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Coarse intra-day bucket: S1 before noon, S2 from noon on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Slot {
    S1,
    S2,
}

impl Slot {
    /// Slot for a local hour of day.
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        if hour < SLOT_SPLIT_HOUR {
            Self::S1
        } else {
            Self::S2
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S1 => "S1",
            Self::S2 => "S2",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "S1" | "s1" => Ok(Self::S1),
            "S2" | "s2" => Ok(Self::S2),
            _ => Err(()),
        }
    }
}

/// Row as delivered by the ingestion collaborator, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(deserialize_with = "deserialize_player_id")]
    pub player_id: String,
    pub timestamp: String,
    pub deposit_amount: f64,
    pub withdrawal_amount: f64,
    pub num_deposit: i64,
    pub num_withdrawal: i64,
    pub games_played: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlayerIdRepr {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

fn deserialize_player_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match PlayerIdRepr::deserialize(deserializer)? {
        PlayerIdRepr::Text(text) => text,
        PlayerIdRepr::Unsigned(value) => value.to_string(),
        PlayerIdRepr::Signed(value) => value.to_string(),
    })
}

/// Validated activity for one player at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub player_id: PlayerId,
    /// Local time in the reporting timezone.
    pub timestamp: NaiveDateTime,
    pub deposit_amount: f64,
    pub withdrawal_amount: f64,
    pub num_deposit: u64,
    pub num_withdrawal: u64,
    pub games_played: u64,
}

/// Activity record with its derived calendar date and slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub activity: ActivityRecord,
    pub date: NaiveDate,
    pub slot: Slot,
}

impl NormalizedRecord {
    /// Derive date and slot from the activity's local timestamp.
    #[must_use]
    pub fn from_activity(activity: ActivityRecord) -> Self {
        let date = activity.timestamp.date();
        let slot = Slot::from_hour(activity.timestamp.hour());
        Self {
            activity,
            date,
            slot,
        }
    }
}

/// Fixed-offset reporting timezone used to derive dates and slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingClock {
    offset: FixedOffset,
}

impl ReportingClock {
    #[must_use]
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Build a clock `minutes` east of UTC.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReportingOffset`] when the offset exceeds +/-18 hours.
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, ConfigError> {
        let out_of_range = || ConfigError::ReportingOffset {
            value: minutes,
            max: MAX_REPORTING_OFFSET_MINUTES,
        };
        if !(-MAX_REPORTING_OFFSET_MINUTES..=MAX_REPORTING_OFFSET_MINUTES).contains(&minutes) {
            return Err(out_of_range());
        }
        let offset = FixedOffset::east_opt(minutes * 60).ok_or_else(out_of_range)?;
        Ok(Self { offset })
    }

    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Parse a timestamp into reporting-local time.
    ///
    /// Naive timestamps are taken as already local; timestamps carrying an
    /// offset are converted. A bare date means local midnight.
    #[must_use]
    pub fn localize(&self, raw: &str) -> Option<NaiveDateTime> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }
        if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
            return Some(instant.with_timezone(&self.offset).naive_local());
        }
        // A trailing `Z` is UTC.
        let zoned = match text.strip_suffix('Z').or_else(|| text.strip_suffix('z')) {
            Some(head) => format!("{head}+00:00"),
            None => text.to_string(),
        };
        for format in OFFSET_TIMESTAMP_FORMATS {
            if let Ok(instant) = DateTime::parse_from_str(&zoned, format) {
                return Some(instant.with_timezone(&self.offset).naive_local());
            }
        }
        for format in NAIVE_TIMESTAMP_FORMATS {
            if let Ok(local) = NaiveDateTime::parse_from_str(text, format) {
                return Some(local);
            }
        }
        NaiveDate::parse_from_str(text, DATE_FORMAT)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }
}

impl Default for ReportingClock {
    fn default() -> Self {
        Self::utc()
    }
}

fn checked_amount(field: &'static str, value: f64) -> Result<f64, MalformedReason> {
    if !value.is_finite() {
        return Err(MalformedReason::NonFiniteAmount { field, value });
    }
    if value < 0.0 {
        return Err(MalformedReason::NegativeAmount { field, value });
    }
    Ok(value)
}

fn checked_count(field: &'static str, value: i64) -> Result<u64, MalformedReason> {
    non_negative_count(value).ok_or(MalformedReason::NegativeCount { field, value })
}

fn validate(raw: &RawRecord, clock: &ReportingClock) -> Result<ActivityRecord, MalformedReason> {
    let player_id = raw.player_id.trim();
    if player_id.is_empty() {
        return Err(MalformedReason::EmptyPlayerId);
    }
    let timestamp = clock
        .localize(&raw.timestamp)
        .ok_or_else(|| MalformedReason::Timestamp {
            value: raw.timestamp.clone(),
        })?;
    Ok(ActivityRecord {
        player_id: PlayerId::new(player_id),
        timestamp,
        deposit_amount: checked_amount("deposit_amount", raw.deposit_amount)?,
        withdrawal_amount: checked_amount("withdrawal_amount", raw.withdrawal_amount)?,
        num_deposit: checked_count("num_deposit", raw.num_deposit)?,
        num_withdrawal: checked_count("num_withdrawal", raw.num_withdrawal)?,
        games_played: checked_count("games_played", raw.games_played)?,
    })
}

/// Normalize one raw row located at `index` in the input.
///
/// # Errors
///
/// Returns [`LoyaltyError::MalformedInput`] for unparseable timestamps,
/// negative or non-finite numbers and empty player ids.
pub fn normalize_record(
    index: usize,
    raw: &RawRecord,
    clock: &ReportingClock,
) -> Result<NormalizedRecord, LoyaltyError> {
    validate(raw, clock)
        .map(NormalizedRecord::from_activity)
        .map_err(|reason| LoyaltyError::MalformedInput {
            index,
            player_id: raw.player_id.clone(),
            reason,
        })
}

/// Normalize every raw row, failing the whole batch on the first bad row.
///
/// # Errors
///
/// Returns [`LoyaltyError::MalformedInput`] identifying the first offending row.
pub fn normalize(
    rows: &[RawRecord],
    clock: &ReportingClock,
) -> Result<Vec<NormalizedRecord>, LoyaltyError> {
    let normalized = rows
        .iter()
        .enumerate()
        .map(|(index, raw)| normalize_record(index, raw, clock))
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!(target: LOG_TARGET, "normalized {} records", normalized.len());
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(timestamp: &str) -> RawRecord {
        RawRecord {
            player_id: "42".to_string(),
            timestamp: timestamp.to_string(),
            deposit_amount: 100.0,
            withdrawal_amount: 20.0,
            num_deposit: 2,
            num_withdrawal: 1,
            games_played: 3,
        }
    }

    fn slot_at(timestamp: &str) -> Slot {
        normalize_record(0, &raw(timestamp), &ReportingClock::utc())
            .unwrap()
            .slot
    }

    #[test]
    fn slot_boundary_is_noon() {
        assert_eq!(slot_at("2023-10-02 00:00:00"), Slot::S1);
        assert_eq!(slot_at("2023-10-02 11:59:59"), Slot::S1);
        assert_eq!(slot_at("2023-10-02 12:00:00"), Slot::S2);
        assert_eq!(slot_at("2023-10-02 23:00:00"), Slot::S2);
    }

    #[test]
    fn slot_from_hour_covers_day() {
        assert_eq!(Slot::from_hour(11), Slot::S1);
        assert_eq!(Slot::from_hour(12), Slot::S2);
        assert_eq!(Slot::from_hour(23), Slot::S2);
    }

    #[test]
    fn accepts_common_timestamp_shapes() {
        let clock = ReportingClock::utc();
        for text in [
            "2023-10-02 08:15:00",
            "2023-10-02T08:15:00",
            "2023-10-02 08:15:00.250",
            "2023-10-02 08:15",
            "2023-10-02T08:15:00Z",
            "2023-10-02 08:15:00Z",
            "2023-10-02T08:15Z",
            "2023-10-02 08:15+00:00",
            "2023-10-02T08:15+0000",
        ] {
            let local = clock.localize(text).expect(text);
            assert_eq!(local.date(), NaiveDate::from_ymd_opt(2023, 10, 2).unwrap());
            assert_eq!(local.hour(), 8, "{text}");
        }
        let midnight = clock.localize("2023-10-02").unwrap();
        assert_eq!(midnight.hour(), 0);
    }

    #[test]
    fn offsets_convert_into_reporting_time() {
        let ist = ReportingClock::from_offset_minutes(330).unwrap();
        let local = ist.localize("2023-10-02T20:00:00Z").unwrap();
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2023, 10, 3).unwrap());
        assert_eq!(local.hour(), 1);

        let naive = ist.localize("2023-10-02 20:00:00").unwrap();
        assert_eq!(naive.hour(), 20);

        let short = ReportingClock::utc()
            .localize("2023-10-02 08:15+05:30")
            .unwrap();
        assert_eq!(short.hour(), 2);
        assert_eq!(short.minute(), 45);
    }

    #[test]
    fn reporting_offset_is_bounded() {
        assert!(ReportingClock::from_offset_minutes(18 * 60).is_ok());
        assert_eq!(
            ReportingClock::from_offset_minutes(-(18 * 60 + 1)),
            Err(ConfigError::ReportingOffset {
                value: -(18 * 60 + 1),
                max: 18 * 60,
            })
        );
    }

    #[test]
    fn bad_timestamp_fails_whole_batch_with_index() {
        let rows = vec![raw("2023-10-02 08:00:00"), raw("yesterday-ish")];
        let err = normalize(&rows, &ReportingClock::utc()).unwrap_err();
        assert_eq!(
            err,
            LoyaltyError::MalformedInput {
                index: 1,
                player_id: "42".to_string(),
                reason: MalformedReason::Timestamp {
                    value: "yesterday-ish".to_string(),
                },
            }
        );
    }

    #[test]
    fn negative_and_non_finite_values_are_rejected() {
        let clock = ReportingClock::utc();
        let mut negative = raw("2023-10-02 08:00:00");
        negative.withdrawal_amount = -5.0;
        assert!(matches!(
            normalize_record(3, &negative, &clock),
            Err(LoyaltyError::MalformedInput {
                index: 3,
                reason: MalformedReason::NegativeAmount {
                    field: "withdrawal_amount",
                    ..
                },
                ..
            })
        ));

        let mut nan = raw("2023-10-02 08:00:00");
        nan.deposit_amount = f64::NAN;
        assert!(matches!(
            normalize_record(0, &nan, &clock),
            Err(LoyaltyError::MalformedInput {
                reason: MalformedReason::NonFiniteAmount { .. },
                ..
            })
        ));

        let mut count = raw("2023-10-02 08:00:00");
        count.num_withdrawal = -1;
        assert!(matches!(
            normalize_record(0, &count, &clock),
            Err(LoyaltyError::MalformedInput {
                reason: MalformedReason::NegativeCount {
                    field: "num_withdrawal",
                    value: -1
                },
                ..
            })
        ));

        let mut blank = raw("2023-10-02 08:00:00");
        blank.player_id = "  ".to_string();
        assert!(matches!(
            normalize_record(0, &blank, &clock),
            Err(LoyaltyError::MalformedInput {
                reason: MalformedReason::EmptyPlayerId,
                ..
            })
        ));
    }

    #[test]
    fn empty_batch_normalizes_to_nothing() {
        let normalized = normalize(&[], &ReportingClock::utc()).unwrap();
        assert!(normalized.is_empty());
    }

    #[test]
    fn player_ids_order_naturally() {
        let mut ids: Vec<PlayerId> = ["10", "9", "alice", "007", "7", "bob", "100"]
            .into_iter()
            .map(PlayerId::from)
            .collect();
        ids.sort();
        let ordered: Vec<&str> = ids.iter().map(PlayerId::as_str).collect();
        assert_eq!(ordered, ["007", "7", "9", "10", "100", "alice", "bob"]);
    }

    #[test]
    fn raw_record_accepts_numeric_player_ids() {
        let row: RawRecord = serde_json::from_str(
            r#"{"player_id": 17, "timestamp": "2023-10-02 08:00:00",
                "deposit_amount": 1.5, "withdrawal_amount": 0,
                "num_deposit": 1, "num_withdrawal": 0, "games_played": 2}"#,
        )
        .unwrap();
        assert_eq!(row.player_id, "17");
    }

    #[test]
    fn slot_parses_case_insensitively() {
        assert_eq!("s2".parse::<Slot>(), Ok(Slot::S2));
        assert_eq!(" S1 ".parse::<Slot>(), Ok(Slot::S1));
        assert!("S3".parse::<Slot>().is_err());
    }
}
