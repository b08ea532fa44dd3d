//! Volume ratio: current volume over its rolling mean.

use super::sma::sma_series;
use super::Indicator;
use crate::domain::{Bar, VolumeSignal};

#[derive(Debug, Clone)]
pub struct VolumeRatio {
    period: usize,
    name: String,
}

impl VolumeRatio {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "volume period must be >= 1");
        Self { period, name: format!("volume_ratio_{period}") }
    }
}

impl Indicator for VolumeRatio {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();
        sma_series(&volumes, self.period)
            .into_iter()
            .zip(&volumes)
            .map(|(mean, &v)| if mean > 0.0 { v / mean } else { f64::NAN })
            .collect()
    }
}

/// Spike classification for one bar: a ratio above `threshold` on a green
/// candle is a bull spike, on a red candle a bear spike. Dojis stay normal.
pub fn volume_signal(bar: &Bar, ratio: f64, threshold: f64) -> VolumeSignal {
    if ratio.is_nan() || ratio <= threshold {
        return VolumeSignal::Normal;
    }
    if bar.is_green() {
        VolumeSignal::BullSpike
    } else if bar.is_red() {
        VolumeSignal::BearSpike
    } else {
        VolumeSignal::Normal
    }
}
