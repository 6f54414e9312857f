//! Loading raw activity rows from JSON or CSV files.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use loyalty_engine::{RawRecord, RecordSource};

use crate::util::split_csv_line;

const CSV_COLUMNS: [&str; 7] = [
    "player_id",
    "timestamp",
    "deposit_amount",
    "withdrawal_amount",
    "num_deposit",
    "num_withdrawal",
    "games_played",
];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON records in {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}:{line}: {reason}")]
    Csv {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("unsupported record file {path} (expected .json or .csv)")]
    UnsupportedFormat { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Json,
    Csv,
}

impl RecordFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// CSV ids made only of digits are integers, so `007` and `7` name one player.
fn canonical_player_id(raw: &str) -> String {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }
    match raw.trim_start_matches('0') {
        "" => "0".to_string(),
        digits => digits.to_string(),
    }
}

/// A record file on disk, decoded according to its extension.
#[derive(Debug, Clone)]
pub struct RecordFile {
    path: PathBuf,
}

impl RecordFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<String, IngestError> {
        fs::read_to_string(&self.path).map_err(|source| IngestError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn csv_error(&self, line: usize, reason: impl Into<String>) -> IngestError {
        IngestError::Csv {
            path: self.path.clone(),
            line,
            reason: reason.into(),
        }
    }

    fn parse_json(&self, text: &str) -> Result<Vec<RawRecord>, IngestError> {
        serde_json::from_str(text).map_err(|source| IngestError::Json {
            path: self.path.clone(),
            source,
        })
    }

    fn parse_csv(&self, text: &str) -> Result<Vec<RawRecord>, IngestError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.trim().is_empty());

        let Some((header_line, header)) = lines.next() else {
            return Ok(Vec::new());
        };
        let header = split_csv_line(header)
            .ok_or_else(|| self.csv_error(header_line, "unterminated quote in header"))?;
        let positions = CSV_COLUMNS
            .iter()
            .map(|column| {
                header
                    .iter()
                    .position(|name| name.trim() == *column)
                    .ok_or_else(|| self.csv_error(header_line, format!("missing column {column}")))
            })
            .collect::<Result<Vec<usize>, _>>()?;

        lines
            .map(|(line_no, line)| {
                let fields = split_csv_line(line)
                    .ok_or_else(|| self.csv_error(line_no, "unterminated quote"))?;
                if fields.len() != header.len() {
                    return Err(self.csv_error(
                        line_no,
                        format!("expected {} fields, found {}", header.len(), fields.len()),
                    ));
                }
                let field = |idx: usize| fields[positions[idx]].trim();
                let amount = |idx: usize| {
                    field(idx).parse::<f64>().map_err(|_| {
                        self.csv_error(line_no, format!("{} is not a number", CSV_COLUMNS[idx]))
                    })
                };
                let count = |idx: usize| {
                    field(idx).parse::<i64>().map_err(|_| {
                        self.csv_error(line_no, format!("{} is not an integer", CSV_COLUMNS[idx]))
                    })
                };
                Ok(RawRecord {
                    player_id: canonical_player_id(field(0)),
                    timestamp: field(1).to_string(),
                    deposit_amount: amount(2)?,
                    withdrawal_amount: amount(3)?,
                    num_deposit: count(4)?,
                    num_withdrawal: count(5)?,
                    games_played: count(6)?,
                })
            })
            .collect()
    }
}

impl RecordSource for RecordFile {
    type Error = IngestError;

    fn load_records(&self) -> Result<Vec<RawRecord>, Self::Error> {
        let format =
            RecordFormat::from_path(&self.path).ok_or_else(|| IngestError::UnsupportedFormat {
                path: self.path.clone(),
            })?;
        let text = self.read()?;
        let records = match format {
            RecordFormat::Json => self.parse_json(&text)?,
            RecordFormat::Csv => self.parse_csv(&text)?,
        };
        log::debug!(
            "loaded {} raw records from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }
}
