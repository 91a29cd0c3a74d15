//! CSV file bar source.
//!
//! Required columns: `time, open, high, low, close, spread`. Optional:
//! `tick_volume`, `real_volume`. Header names are matched case-insensitively
//! and column order does not matter.

use chrono::{DateTime, NaiveDateTime};
use std::io;
use std::path::Path;

use crate::domain::bar::{Bar, RawBar};
use crate::domain::error::BarwiseError;
use crate::ports::bar_source::BarSource;

pub const REQUIRED_COLUMNS: [&str; 6] = ["time", "open", "high", "low", "close", "spread"];

const TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a bar timestamp: one of the accepted layouts or integer unix seconds.
pub fn parse_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            let secs: i64 = value.parse().ok()?;
            DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
        })
}

fn csv_error(err: csv::Error, row: usize) -> BarwiseError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => BarwiseError::Io(e),
        other => BarwiseError::MalformedInput {
            row,
            reason: format!("{other:?}"),
        },
    }
}

struct Layout {
    time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    spread: usize,
    tick_volume: Option<usize>,
    real_volume: Option<usize>,
}

impl Layout {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, BarwiseError> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |name: &str| names.iter().position(|h| h == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| find(**c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(BarwiseError::MissingColumns { columns: missing });
        }

        let required = |name: &str| {
            find(name).ok_or_else(|| BarwiseError::MissingColumns {
                columns: vec![name.to_string()],
            })
        };
        Ok(Layout {
            time: required("time")?,
            open: required("open")?,
            high: required("high")?,
            low: required("low")?,
            close: required("close")?,
            spread: required("spread")?,
            tick_volume: find("tick_volume"),
            real_volume: find("real_volume"),
        })
    }

    fn parse(&self, record: &csv::StringRecord, row: usize) -> Result<RawBar, BarwiseError> {
        let number = |index: Option<usize>, name: &str| -> Result<Option<f64>, BarwiseError> {
            let Some(raw) = index.and_then(|i| record.get(i)).map(str::trim) else {
                return Ok(None);
            };
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse::<f64>()
                .map(Some)
                .map_err(|_| BarwiseError::MalformedInput {
                    row,
                    reason: format!("invalid {name} value {raw:?}"),
                })
        };

        let time = match record.get(self.time).map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_time(raw).ok_or_else(|| BarwiseError::MalformedInput {
                row,
                reason: format!("invalid time value {raw:?}"),
            })?),
        };

        Ok(RawBar {
            time,
            open: number(Some(self.open), "open")?,
            high: number(Some(self.high), "high")?,
            low: number(Some(self.low), "low")?,
            close: number(Some(self.close), "close")?,
            spread: number(Some(self.spread), "spread")?,
            tick_volume: number(self.tick_volume, "tick_volume")?,
            real_volume: number(self.real_volume, "real_volume")?,
        })
    }
}

/// Read rows as-is, without normalization, keeping at most `limit` of them.
pub fn read_raw_rows<R: io::Read>(
    reader: R,
    limit: Option<usize>,
) -> Result<Vec<RawBar>, BarwiseError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers().map_err(|e| csv_error(e, 0))?.clone();
    let layout = Layout::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        if limit.is_some_and(|n| rows.len() >= n) {
            break;
        }
        let record = result.map_err(|e| csv_error(e, row))?;
        rows.push(layout.parse(&record, row)?);
    }
    Ok(rows)
}

pub fn read_raw_file<P: AsRef<Path>>(
    path: P,
    limit: Option<usize>,
) -> Result<Vec<RawBar>, BarwiseError> {
    let file = std::fs::File::open(path)?;
    read_raw_rows(io::BufReader::new(file), limit)
}

/// Replays bars from a CSV file in file order.
#[derive(Debug, Clone)]
pub struct CsvBarSource {
    bars: Vec<Bar>,
    next: usize,
}

impl CsvBarSource {
    pub fn from_path<P: AsRef<Path>>(path: P, limit: Option<usize>) -> Result<Self, BarwiseError> {
        Self::from_rows(&read_raw_file(path, limit)?)
    }

    pub fn from_reader<R: io::Read>(reader: R, limit: Option<usize>) -> Result<Self, BarwiseError> {
        Self::from_rows(&read_raw_rows(reader, limit)?)
    }

    /// Normalize rows up front so a malformed row fails construction.
    pub fn from_rows(rows: &[RawBar]) -> Result<Self, BarwiseError> {
        let bars = rows
            .iter()
            .enumerate()
            .map(|(i, raw)| raw.normalize(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CsvBarSource { bars, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.bars.len() - self.next
    }
}

impl BarSource for CsvBarSource {
    fn next_bar(&mut self) -> Result<Option<Bar>, BarwiseError> {
        let bar = self.bars.get(self.next).cloned();
        if bar.is_some() {
            self.next += 1;
        }
        Ok(bar)
    }
}
