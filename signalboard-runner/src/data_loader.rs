//! Loading snapshots and bars from disk.
//!
//! Snapshots come as JSON, either a bare array or the backend's
//! `{"status": "success", "data": [...]}` envelope. Bars come as CSV with a
//! `symbol,timestamp,open,high,low,close,volume` header and are grouped per
//! symbol in time order.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use signalboard_core::domain::{Bar, IndicatorSnapshot};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("backend reported status '{status}': {message}")]
    Backend { status: String, message: String },

    #[error("malformed bar CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("bar CSV line {line}: {reason}")]
    InvalidBar { line: u64, reason: String },
}

/// Per-symbol bar series, each sorted by timestamp.
pub type BarSeries = BTreeMap<String, Vec<Bar>>;

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotPayload {
    Rows(Vec<Value>),
    Envelope {
        status: String,
        #[serde(default)]
        data: Vec<Value>,
        #[serde(default, alias = "detail")]
        message: Option<String>,
    },
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse snapshots from a JSON string.
///
/// Rows are decoded one by one: a row that does not decode is logged and
/// skipped, and the rest of the board still loads. Only a payload where no
/// row decodes at all is an error.
pub fn parse_snapshots(json: &str) -> Result<Vec<IndicatorSnapshot>, LoadError> {
    let rows = match serde_json::from_str::<SnapshotPayload>(json) {
        Ok(SnapshotPayload::Rows(rows)) => rows,
        Ok(SnapshotPayload::Envelope { status, data, message }) => {
            if !status.eq_ignore_ascii_case("success") {
                return Err(LoadError::Backend { status, message: message.unwrap_or_default() });
            }
            data
        }
        // Untagged errors are opaque; retry as a plain array for a useful message.
        Err(_) => serde_json::from_str::<Vec<Value>>(json)?,
    };
    decode_rows(rows)
}

fn decode_rows(rows: Vec<Value>) -> Result<Vec<IndicatorSnapshot>, LoadError> {
    let total = rows.len();
    let mut snaps = Vec::with_capacity(total);
    let mut first_error = None;
    for (index, row) in rows.into_iter().enumerate() {
        let symbol = row.get("symbol").and_then(Value::as_str).unwrap_or("?").to_string();
        match serde_json::from_value::<IndicatorSnapshot>(row) {
            Ok(snap) => snaps.push(snap),
            Err(e) => {
                warn!(index, symbol = %symbol, error = %e, "skipping undecodable snapshot row");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    match first_error {
        Some(e) if snaps.is_empty() => Err(LoadError::Json(e)),
        _ => {
            if snaps.len() < total {
                debug!(kept = snaps.len(), skipped = total - snaps.len(), "decoded snapshot rows");
            }
            Ok(snaps)
        }
    }
}

pub fn load_snapshots(path: impl AsRef<Path>) -> Result<Vec<IndicatorSnapshot>, LoadError> {
    let path = path.as_ref();
    let snaps = parse_snapshots(&read(path)?)?;
    debug!(path = %path.display(), rows = snaps.len(), "loaded snapshots");
    Ok(snaps)
}

#[derive(Deserialize)]
struct BarRecord {
    symbol: String,
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// Accepts `2024-03-11 09:15:00`, `2024-03-11T09:15:00`, `2024-03-11 09:15`
/// and bare dates (midnight).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    const FORMATS: [&str; 4] =
        ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse bars from any CSV reader.
///
/// Bars that fail the OHLC sanity check are dropped with a warning;
/// unparseable timestamps are an error. Duplicate timestamps keep the last row.
pub fn read_bars_csv<R: std::io::Read>(reader: R) -> Result<BarSeries, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut series = BarSeries::new();

    for (i, record) in rdr.deserialize::<BarRecord>().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = i as u64 + 2;
        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::InvalidBar {
            line,
            reason: format!("unrecognised timestamp '{}'", record.timestamp),
        })?;
        let bar = Bar {
            symbol: record.symbol.trim().to_uppercase(),
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume.unwrap_or(0.0).max(0.0) as u64,
        };
        if !bar.is_sane() {
            warn!(line, symbol = %bar.symbol, "dropping bar with inconsistent OHLC");
            continue;
        }
        series.entry(bar.symbol.clone()).or_default().push(bar);
    }

    for bars in series.values_mut() {
        bars.sort_by_key(|b| b.timestamp);
        bars.reverse();
        bars.dedup_by_key(|b| b.timestamp);
        bars.reverse();
    }
    Ok(series)
}

pub fn load_bars_csv(path: impl AsRef<Path>) -> Result<BarSeries, LoadError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let series = read_bars_csv(file)?;
    debug!(
        path = %path.display(),
        symbols = series.len(),
        bars = series.values().map(Vec::len).sum::<usize>(),
        "loaded bars"
    );
    Ok(series)
}
