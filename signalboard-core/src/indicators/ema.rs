//! Exponential moving average, seeded with the SMA of the first window.

use super::{closes, Indicator};
use crate::domain::Bar;

/// EMA with alpha = 2 / (period + 1). A NaN after the seed ends the series.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }
    let seed_window = &values[..period];
    if seed_window.iter().any(|v| v.is_nan()) {
        return out;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed_window.iter().sum::<f64>() / period as f64;
    out[period - 1] = prev;
    for i in period..n {
        if values[i].is_nan() {
            break;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        out[i] = prev;
    }
    out
}

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self { period, name: format!("ema_{period}") }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        ema_series(&closes(bars), self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn seeded_then_recursive() {
        // period 3: alpha 0.5, seed = mean(2, 4, 6) = 4
        let out = ema_series(&[2.0, 4.0, 6.0, 8.0, 10.0], 3);
        assert!(out[0].is_nan() && out[1].is_nan());
        assert_approx(out[2], 4.0, DEFAULT_EPSILON);
        assert_approx(out[3], 6.0, DEFAULT_EPSILON);
        assert_approx(out[4], 8.0, DEFAULT_EPSILON);
    }

    #[test]
    fn fast_leads_slow_in_uptrend() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let fast = Ema::new(9).compute(&bars);
        let slow = Ema::new(21).compute(&bars);
        assert!(fast[39] > slow[39]);
    }

    #[test]
    fn nan_ends_series() {
        let out = ema_series(&[1.0, 2.0, 3.0, f64::NAN, 5.0], 2);
        assert!(!out[2].is_nan());
        assert!(out[3].is_nan() && out[4].is_nan());
    }
}
