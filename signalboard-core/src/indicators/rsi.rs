//! Relative Strength Index with Wilder smoothing.
//!
//! Flat history reads 50; only gains reads 100; only losses reads 0.

use super::{closes, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self { period, name: format!("rsi_{period}") }
    }

    /// RSI over an arbitrary close series.
    pub fn over(&self, closes: &[f64]) -> Vec<f64> {
        let n = closes.len();
        let period = self.period;
        let mut out = vec![f64::NAN; n];
        if n <= period {
            return out;
        }

        let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        let seed = &changes[..period];
        if seed.iter().any(|c| c.is_nan()) {
            return out;
        }
        let mut avg_gain = seed.iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
        let mut avg_loss = seed.iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;
        out[period] = rsi_from(avg_gain, avg_loss);

        let alpha = 1.0 / period as f64;
        for (i, &change) in changes.iter().enumerate().skip(period) {
            if change.is_nan() {
                break;
            }
            avg_gain = alpha * change.max(0.0) + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * (-change).max(0.0) + (1.0 - alpha) * avg_loss;
            out[i + 1] = rsi_from(avg_gain, avg_loss);
        }
        out
    }
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    match (avg_gain == 0.0, avg_loss == 0.0) {
        (true, true) => 50.0,
        (_, true) => 100.0,
        (true, _) => 0.0,
        _ => 100.0 - 100.0 / (1.0 + avg_gain / avg_loss),
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.over(&closes(bars))
    }
}
