//! Indicator library used to build snapshots from raw bars.
//!
//! Every indicator is a pure function of the bar history: the value at bar t
//! never depends on bars after t. Warmup positions are `f64::NAN`, and a NaN
//! input poisons the windows that contain it.
//!
//! The series helpers (`sma_series`, `ema_series`, `wilder_smooth`) work on
//! plain `f64` slices so volume and price share one implementation.

pub mod atr;
pub mod ema;
pub mod rsi;
pub mod sma;
pub mod supertrend;
pub mod volume;

pub use atr::{true_range, wilder_smooth, Atr};
pub use ema::{ema_series, Ema};
pub use rsi::Rsi;
pub use sma::{sma_series, Sma};
pub use supertrend::{supertrend_direction, Supertrend, SupertrendSeries};
pub use volume::{volume_signal, VolumeRatio};

use crate::domain::Bar;

/// Trait for bar-series indicators.
///
/// `compute` returns one value per input bar. The first `lookback()` values
/// are NaN.
pub trait Indicator: Send + Sync {
    /// Series name, e.g. "rsi_14".
    fn name(&self) -> &str;

    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Last value of a series, if it is a number.
pub fn last_valid(series: &[f64]) -> Option<f64> {
    series.last().copied().filter(|v| v.is_finite())
}

pub(crate) fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Synthetic 5-minute bars from closes: open = previous close,
/// high/low one point outside the body, volume 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let start = chrono::NaiveDate::from_ymd_opt(2024, 3, 11)
        .unwrap()
        .and_hms_opt(9, 15, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                symbol: "TEST".to_string(),
                timestamp: start + chrono::Duration::minutes(5 * i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, epsilon={epsilon}"
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
