//! Simple moving average. Used for the DMA levels and the volume baseline.

use super::{closes, Indicator};
use crate::domain::Bar;

/// Rolling mean over `period` values. Windows containing NaN yield NaN.
pub fn sma_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }

    let mut sum = 0.0;
    let mut nan_count = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            nan_count += 1;
        } else {
            sum += v;
        }
        if i >= period {
            let leaving = values[i - period];
            if leaving.is_nan() {
                nan_count -= 1;
            } else {
                sum -= leaving;
            }
        }
        if i + 1 >= period && nan_count == 0 {
            out[i] = sum / period as f64;
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self { period, name: format!("sma_{period}") }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        sma_series(&closes(bars), self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn rolling_mean() {
        let out = Sma::new(5).compute(&make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]));
        assert!(out[..4].iter().all(|v| v.is_nan()));
        assert_approx(out[4], 12.0, DEFAULT_EPSILON);
        assert_approx(out[6], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn nan_poisons_only_its_windows() {
        let out = sma_series(&[10.0, 11.0, f64::NAN, 13.0, 14.0, 15.0], 3);
        assert!(out[2].is_nan() && out[3].is_nan() && out[4].is_nan());
        assert_approx(out[5], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn short_history_is_all_warmup() {
        assert!(sma_series(&[1.0, 2.0], 5).iter().all(|v| v.is_nan()));
        assert_eq!(Sma::new(200).lookback(), 199);
    }
}
