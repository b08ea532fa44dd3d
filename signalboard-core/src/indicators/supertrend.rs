//! Supertrend: ATR bands that ratchet toward price and flip on a close
//! through the active band.
//!
//! The band value is the trailing stop: the lower band while trending up,
//! the upper band while trending down.

use super::atr::{true_range, wilder_smooth};
use super::Indicator;
use crate::domain::{Bar, Direction};

/// Band value and trend direction per bar. Warmup bars are NaN / `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct SupertrendSeries {
    pub value: Vec<f64>,
    pub direction: Vec<Option<Direction>>,
}

impl SupertrendSeries {
    /// Value and direction at the last bar, if both are known.
    pub fn latest(&self) -> Option<(f64, Direction)> {
        let value = self.value.last().copied().filter(|v| v.is_finite())?;
        let direction = (*self.direction.last()?)?;
        Some((value, direction))
    }
}

#[derive(Debug, Clone)]
pub struct Supertrend {
    period: usize,
    multiplier: f64,
    name: String,
}

impl Supertrend {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Supertrend period must be >= 1");
        Self { period, multiplier, name: format!("supertrend_{period}_{multiplier}") }
    }

    pub fn compute_series(&self, bars: &[Bar]) -> SupertrendSeries {
        let n = bars.len();
        let mut value = vec![f64::NAN; n];
        let mut direction = vec![None; n];

        let mut tr = true_range(bars);
        if let Some(first) = tr.first_mut() {
            *first = f64::NAN;
        }
        let atr = wilder_smooth(&tr, self.period);
        let Some(start) = atr.iter().position(|v| !v.is_nan()) else {
            return SupertrendSeries { value, direction };
        };

        let hl2 = (bars[start].high + bars[start].low) / 2.0;
        let mut upper = hl2 + self.multiplier * atr[start];
        let mut lower = hl2 - self.multiplier * atr[start];
        let mut trend = Direction::Buy;
        value[start] = lower;
        direction[start] = Some(trend);

        for i in start + 1..n {
            let bar = &bars[i];
            if atr[i].is_nan() || bar.is_void() {
                continue;
            }
            let hl2 = (bar.high + bar.low) / 2.0;
            let basic_upper = hl2 + self.multiplier * atr[i];
            let basic_lower = hl2 - self.multiplier * atr[i];

            // Bands only tighten while price stays on their side.
            let prev_close = bars[i - 1].close;
            upper = if prev_close <= upper { basic_upper.min(upper) } else { basic_upper };
            lower = if prev_close >= lower { basic_lower.max(lower) } else { basic_lower };

            trend = match trend {
                Direction::Buy if bar.close < lower => Direction::Sell,
                Direction::Sell if bar.close > upper => Direction::Buy,
                t => t,
            };
            value[i] = match trend {
                Direction::Buy => lower,
                Direction::Sell => upper,
            };
            direction[i] = Some(trend);
        }

        SupertrendSeries { value, direction }
    }
}

impl Indicator for Supertrend {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.compute_series(bars).value
    }
}

/// Trend direction per bar for the given parameters.
pub fn supertrend_direction(bars: &[Bar], period: usize, multiplier: f64) -> Vec<Option<Direction>> {
    Supertrend::new(period, multiplier).compute_series(bars).direction
}
