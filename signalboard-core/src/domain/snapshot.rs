//! IndicatorSnapshot: one symbol, one timeframe, one point in time.
//!
//! Snapshots arrive from the backend indicator service. Every indicator field
//! is optional: absent means "not yet computed" and must never be read as a
//! bearish or bullish value.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::signal::{Direction, PatternPolarity, VolumeSignal};

/// Data-quality problems found on a single snapshot.
///
/// These are upstream issues; evaluation isolates them to the offending
/// snapshot instead of failing the whole board.
#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("{symbol}: last traded price {ltp} is not a positive finite number")]
    InvalidPrice { symbol: String, ltp: f64 },

    #[error("{symbol}: RSI {rsi} is outside [0, 100]")]
    RsiOutOfRange { symbol: String, rsi: f64 },

    #[error("{symbol}: {field} is not finite")]
    NonFinite { symbol: String, field: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    // ── Identity ──
    pub symbol: String,
    pub isin: String,

    // ── Classification ──
    #[serde(default)]
    pub sector_group: Option<String>,
    #[serde(default)]
    pub sector_subgroup: Option<String>,

    // ── Price ──
    /// A null price from upstream arrives as NaN and fails validation.
    #[serde(deserialize_with = "de_price")]
    pub ltp: f64,

    // ── Oscillator ──
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default)]
    pub rsi_day_high: Option<f64>,
    #[serde(default)]
    pub rsi_day_low: Option<f64>,

    // ── Trend ──
    #[serde(default)]
    pub ema_fast: Option<f64>,
    #[serde(default)]
    pub ema_slow: Option<f64>,
    #[serde(default)]
    pub ema_signal: Option<Direction>,

    // ── Supertrend ──
    #[serde(default)]
    pub supertrend_dir: Option<Direction>,
    #[serde(default)]
    pub supertrend_value: Option<f64>,

    // ── Volume ──
    #[serde(default)]
    pub volume_ratio: Option<f64>,
    #[serde(default)]
    pub volume_signal: Option<VolumeSignal>,

    // ── Moving averages: period -> value ──
    #[serde(default, alias = "dma_data", deserialize_with = "de_dma_values")]
    pub dma_values: BTreeMap<u32, f64>,

    // ── Pattern ──
    #[serde(default)]
    pub candlestick_pattern: Option<String>,

    // ── Multi-timeframe: timeframe code -> direction ──
    #[serde(default, deserialize_with = "de_mtf_data")]
    pub mtf_data: BTreeMap<String, Direction>,

    // ── Fundamentals (display pass-through) ──
    #[serde(default)]
    pub pe: Option<f64>,
    #[serde(default)]
    pub roe: Option<f64>,
}

impl IndicatorSnapshot {
    /// Minimal snapshot with only identity and price populated.
    pub fn new(symbol: impl Into<String>, isin: impl Into<String>, ltp: f64) -> Self {
        Self {
            symbol: symbol.into(),
            isin: isin.into(),
            sector_group: None,
            sector_subgroup: None,
            ltp,
            rsi: None,
            rsi_day_high: None,
            rsi_day_low: None,
            ema_fast: None,
            ema_slow: None,
            ema_signal: None,
            supertrend_dir: None,
            supertrend_value: None,
            volume_ratio: None,
            volume_signal: None,
            dma_values: BTreeMap::new(),
            candlestick_pattern: None,
            mtf_data: BTreeMap::new(),
            pe: None,
            roe: None,
        }
    }

    /// Moving average value for a period, if computed.
    pub fn dma(&self, period: u32) -> Option<f64> {
        self.dma_values.get(&period).copied()
    }

    /// EMA crossover direction.
    ///
    /// Prefers the upstream `ema_signal`; falls back to comparing fast and slow
    /// EMAs when only the raw values were delivered.
    pub fn ema_direction(&self) -> Option<Direction> {
        if let Some(signal) = self.ema_signal {
            return Some(signal);
        }
        match (self.ema_fast, self.ema_slow) {
            (Some(fast), Some(slow)) if fast.is_finite() && slow.is_finite() => {
                Some(if fast > slow { Direction::Buy } else { Direction::Sell })
            }
            _ => None,
        }
    }

    pub fn pattern_polarity(&self) -> Option<PatternPolarity> {
        self.candlestick_pattern
            .as_deref()
            .map(PatternPolarity::from_label)
    }

    /// Check the snapshot for out-of-domain values.
    ///
    /// Absent fields are fine; only present-but-malformed values are reported.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if !self.ltp.is_finite() || self.ltp <= 0.0 {
            return Err(SnapshotError::InvalidPrice {
                symbol: self.symbol.clone(),
                ltp: self.ltp,
            });
        }

        if let Some(rsi) = self.rsi {
            if !(0.0..=100.0).contains(&rsi) {
                return Err(SnapshotError::RsiOutOfRange {
                    symbol: self.symbol.clone(),
                    rsi,
                });
            }
        }

        let optional_fields = [
            ("ema_fast", self.ema_fast),
            ("ema_slow", self.ema_slow),
            ("supertrend_value", self.supertrend_value),
            ("volume_ratio", self.volume_ratio),
        ];
        for (field, value) in optional_fields {
            if matches!(value, Some(v) if !v.is_finite()) {
                return Err(SnapshotError::NonFinite {
                    symbol: self.symbol.clone(),
                    field: field.to_string(),
                });
            }
        }

        if let Some((period, _)) = self.dma_values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SnapshotError::NonFinite {
                symbol: self.symbol.clone(),
                field: format!("dma_{period}"),
            });
        }

        Ok(())
    }
}

fn de_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Accepts `{"20": 101.4}` as well as the backend's `{"SMA_20": 101.4}`.
/// Null values and unrecognised keys are dropped.
fn de_dma_values<'de, D>(deserializer: D) -> Result<BTreeMap<u32, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<f64>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| {
            let digits = key
                .strip_prefix("SMA_")
                .or_else(|| key.strip_prefix("sma_"))
                .unwrap_or(&key);
            Some((digits.parse::<u32>().ok()?, value?))
        })
        .collect())
}

/// Null entries mean "still calculating" and are dropped.
fn de_mtf_data<'de, D>(deserializer: D) -> Result<BTreeMap<String, Direction>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<Direction>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(code, dir)| Some((code, dir?)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_backend_shape() {
        let json = r#"{
            "symbol": "TCS",
            "isin": "INE467B01029",
            "ltp": 3450.5,
            "rsi": 61.2,
            "ema_signal": "BUY",
            "supertrend_dir": "SELL",
            "supertrend_value": 3500.0,
            "volume_signal": "NORMAL",
            "dma_data": {"SMA_20": 3400.0, "SMA_50": null, "SMA_200": 3300.0},
            "mtf_data": {"1d": "BUY", "1w": null},
            "confluence_rank": 4,
            "trade_strategy": "PERFECT_BUY"
        }"#;
        let snap: IndicatorSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.symbol, "TCS");
        assert_eq!(snap.dma(20), Some(3400.0));
        assert_eq!(snap.dma(50), None);
        assert_eq!(snap.dma(200), Some(3300.0));
        assert_eq!(snap.mtf_data.len(), 1);
        assert_eq!(snap.mtf_data["1d"], Direction::Buy);
        assert_eq!(snap.supertrend_dir, Some(Direction::Sell));
    }

    #[test]
    fn deserializes_minimal_record() {
        let snap: IndicatorSnapshot =
            serde_json::from_str(r#"{"symbol": "X", "isin": "Y", "ltp": 10.0}"#).unwrap();
        assert!(snap.rsi.is_none());
        assert!(snap.dma_values.is_empty());
        assert!(snap.mtf_data.is_empty());
    }

    #[test]
    fn null_price_is_kept_for_validation() {
        let snap: IndicatorSnapshot =
            serde_json::from_str(r#"{"symbol": "X", "isin": "Y", "ltp": null}"#).unwrap();
        assert!(snap.ltp.is_nan());
        assert!(matches!(snap.validate(), Err(SnapshotError::InvalidPrice { .. })));
    }

    #[test]
    fn numeric_dma_keys_round_trip() {
        let mut snap = IndicatorSnapshot::new("X", "Y", 10.0);
        snap.dma_values.insert(20, 9.5);
        let json = serde_json::to_string(&snap).unwrap();
        let back: IndicatorSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dma(20), Some(9.5));
    }

    #[test]
    fn ema_direction_falls_back_to_raw_values() {
        let mut snap = IndicatorSnapshot::new("X", "Y", 10.0);
        assert_eq!(snap.ema_direction(), None);
        snap.ema_fast = Some(10.2);
        snap.ema_slow = Some(10.0);
        assert_eq!(snap.ema_direction(), Some(Direction::Buy));
        snap.ema_signal = Some(Direction::Sell);
        assert_eq!(snap.ema_direction(), Some(Direction::Sell));
    }

    #[test]
    fn validate_flags_bad_price() {
        let snap = IndicatorSnapshot::new("BAD", "I", -1.0);
        assert!(matches!(
            snap.validate(),
            Err(SnapshotError::InvalidPrice { .. })
        ));
        let snap = IndicatorSnapshot::new("NAN", "I", f64::NAN);
        assert!(snap.validate().is_err());
    }

    #[test]
    fn validate_flags_rsi_out_of_range() {
        let mut snap = IndicatorSnapshot::new("X", "I", 100.0);
        snap.rsi = Some(140.0);
        assert_eq!(
            snap.validate(),
            Err(SnapshotError::RsiOutOfRange { symbol: "X".into(), rsi: 140.0 })
        );
    }

    #[test]
    fn validate_flags_non_finite_dma() {
        let mut snap = IndicatorSnapshot::new("X", "I", 100.0);
        snap.dma_values.insert(50, f64::INFINITY);
        assert_eq!(
            snap.validate(),
            Err(SnapshotError::NonFinite { symbol: "X".into(), field: "dma_50".into() })
        );
    }

    #[test]
    fn validate_accepts_sparse_snapshot() {
        assert!(IndicatorSnapshot::new("X", "I", 1.0).validate().is_ok());
    }
}
