//! Build indicator snapshots from raw bar series.
//!
//! The builder computes the same fields the backend delivers: RSI with the
//! latest session's RSI high/low, the EMA pair and its crossover signal,
//! Supertrend band and direction, volume ratio and spike, the configured
//! DMA levels, and Supertrend direction for each of the mode's timeframes.
//! Candlestick patterns and fundamentals are left empty.

use rayon::prelude::*;
use signalboard_core::config::{ConfigError, TradingConfig};
use signalboard_core::domain::{Bar, Direction, IndicatorSnapshot, Mode, Timeframe};
use signalboard_core::indicators::{
    ema_series, last_valid, sma_series, volume_signal, Indicator, Rsi, Supertrend, VolumeRatio,
};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::data_loader::BarSeries;
use crate::resample::{resample_with_offset, SESSION_OFFSET_MINUTES};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("empty bar series")]
    EmptySeries,

    #[error("latest bar for {symbol} has no usable close")]
    NoPrice { symbol: String },
}

/// Builds snapshots for one mode with one configuration.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder<'a> {
    config: &'a TradingConfig,
    mode: Mode,
    base: Timeframe,
}

impl<'a> SnapshotBuilder<'a> {
    /// The config is validated up front so indicator periods are known good.
    pub fn new(config: &'a TradingConfig, mode: Mode) -> Result<Self, BuildError> {
        config.validate()?;
        Ok(Self { config, mode, base: mode.default_timeframe() })
    }

    /// Timeframe of the bars passed to `build`. Defaults to the mode's first.
    pub fn with_base_timeframe(mut self, base: Timeframe) -> Self {
        self.base = base;
        self
    }

    /// Snapshot for one symbol. `daily` feeds the DMA levels; when absent the
    /// series itself is used, which is right for swing mode's daily bars.
    pub fn build(&self, bars: &[Bar], daily: Option<&[Bar]>) -> Result<IndicatorSnapshot, BuildError> {
        let last = bars.last().ok_or(BuildError::EmptySeries)?;
        if !last.close.is_finite() || last.close <= 0.0 {
            return Err(BuildError::NoPrice { symbol: last.symbol.clone() });
        }
        let cfg = self.config;
        let mut snap = IndicatorSnapshot::new(last.symbol.clone(), last.symbol.clone(), last.close);
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let rsi = Rsi::new(cfg.rsi.period).over(&closes);
        snap.rsi = last_valid(&rsi);
        let session = last.date();
        let session_rsi = bars
            .iter()
            .zip(&rsi)
            .filter(|(b, v)| b.date() == session && v.is_finite())
            .map(|(_, &v)| v);
        let (lo, hi) = session_rsi.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if lo.is_finite() {
            snap.rsi_day_low = Some(lo);
            snap.rsi_day_high = Some(hi);
        }

        snap.ema_fast = last_valid(&ema_series(&closes, cfg.ema.fast_period));
        snap.ema_slow = last_valid(&ema_series(&closes, cfg.ema.slow_period));
        if let (Some(fast), Some(slow)) = (snap.ema_fast, snap.ema_slow) {
            snap.ema_signal = Some(if fast > slow { Direction::Buy } else { Direction::Sell });
        }

        let supertrend = Supertrend::new(cfg.supertrend.period, cfg.supertrend.multiplier);
        if let Some((value, direction)) = supertrend.compute_series(bars).latest() {
            snap.supertrend_value = Some(value);
            snap.supertrend_dir = Some(direction);
        }

        let ratio = last_valid(&VolumeRatio::new(cfg.volume.period).compute(bars));
        snap.volume_ratio = ratio;
        snap.volume_signal = ratio.map(|r| volume_signal(last, r, cfg.volume.threshold));

        let dma_source = daily.unwrap_or(bars);
        let dma_closes: Vec<f64> = dma_source.iter().map(|b| b.close).collect();
        for &period in &cfg.dma.periods {
            if dma_closes.len() < period as usize {
                continue;
            }
            if let Some(v) = last_valid(&sma_series(&dma_closes, period as usize)) {
                snap.dma_values.insert(period, v);
            }
        }

        snap.mtf_data = self.mtf_directions(bars, &supertrend);
        debug!(symbol = %snap.symbol, rsi = ?snap.rsi, trend = ?snap.supertrend_dir, "built snapshot");
        Ok(snap)
    }

    fn mtf_directions(&self, bars: &[Bar], supertrend: &Supertrend) -> BTreeMap<String, Direction> {
        self.mode
            .timeframes()
            .iter()
            .filter(|&&tf| tf >= self.base)
            .filter_map(|&tf| {
                let series = self.timeframe_bars(bars, tf);
                let (_, direction) = supertrend.compute_series(&series).latest()?;
                Some((tf.code().to_string(), direction))
            })
            .collect()
    }

    /// Candles for `tf` built from base bars. Intraday candles start at the
    /// session open, so the first hourly candle is 09:15-10:14.
    fn timeframe_bars(&self, bars: &[Bar], tf: Timeframe) -> Vec<Bar> {
        if tf == self.base {
            bars.to_vec()
        } else {
            resample_with_offset(bars, tf, SESSION_OFFSET_MINUTES)
        }
    }

    /// Snapshots for every symbol in parallel. Symbols that fail are logged
    /// and skipped; output is in symbol order.
    pub fn build_all(&self, series: &BarSeries, daily: Option<&BarSeries>) -> Vec<IndicatorSnapshot> {
        series
            .par_iter()
            .filter_map(|(symbol, bars)| {
                let daily_bars = daily.and_then(|d| d.get(symbol)).map(Vec::as_slice);
                match self.build(bars, daily_bars) {
                    Ok(snap) => Some(snap),
                    Err(err) => {
                        warn!(%symbol, error = %err, "skipping symbol");
                        None
                    }
                }
            })
            .collect()
    }
}
