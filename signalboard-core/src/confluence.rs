//! Confluence scoring: how many independent signals agree with the trend.
//!
//! Supertrend direction is the baseline. Each enabled module casts a vote:
//! it agrees with the baseline, disagrees, or has no data. The rank is the
//! number of agreeing votes. Disagreement never subtracts, and a missing
//! input is never counted as disagreement.
//!
//! Modules disabled in the configuration are not built at all, so they are
//! absent from `available` as well as from the rank.

use serde::Serialize;

use crate::config::{PatternConfig, TradingConfig};
use crate::domain::{Direction, IndicatorSnapshot, PatternPolarity, VolumeSignal};

/// One module's verdict on a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Agrees,
    Disagrees,
    /// The module's input is missing on this snapshot.
    Unavailable,
}

impl Vote {
    fn from_agreement(agrees: bool) -> Self {
        if agrees {
            Vote::Agrees
        } else {
            Vote::Disagrees
        }
    }
}

/// Trait for confluence modules.
///
/// A module compares one indicator family against the Supertrend baseline.
/// Modules are pure: they read the snapshot and their own thresholds only.
pub trait ConfluenceModule: Send + Sync {
    /// Stable module name (e.g. "rsi", "volume").
    fn name(&self) -> &'static str;

    fn vote(&self, snapshot: &IndicatorSnapshot, direction: Direction) -> Vote;
}

/// RSI momentum: overbought confirms a BUY trend, oversold confirms a SELL trend.
#[derive(Debug, Clone)]
pub struct RsiModule {
    pub overbought: f64,
    pub oversold: f64,
}

impl ConfluenceModule for RsiModule {
    fn name(&self) -> &'static str {
        "rsi"
    }

    fn vote(&self, snapshot: &IndicatorSnapshot, direction: Direction) -> Vote {
        let Some(rsi) = snapshot.rsi else {
            return Vote::Unavailable;
        };
        Vote::from_agreement(match direction {
            Direction::Buy => rsi > self.overbought,
            Direction::Sell => rsi < self.oversold,
        })
    }
}

/// EMA fast/slow crossover.
#[derive(Debug, Clone)]
pub struct EmaModule;

impl ConfluenceModule for EmaModule {
    fn name(&self) -> &'static str {
        "ema"
    }

    fn vote(&self, snapshot: &IndicatorSnapshot, direction: Direction) -> Vote {
        match snapshot.ema_direction() {
            Some(signal) => Vote::from_agreement(signal == direction),
            None => Vote::Unavailable,
        }
    }
}

/// Volume spike in the direction of the trend.
#[derive(Debug, Clone)]
pub struct VolumeModule;

impl ConfluenceModule for VolumeModule {
    fn name(&self) -> &'static str {
        "volume"
    }

    fn vote(&self, snapshot: &IndicatorSnapshot, direction: Direction) -> Vote {
        match snapshot.volume_signal {
            Some(signal) => Vote::from_agreement(signal == VolumeSignal::confirming(direction)),
            None => Vote::Unavailable,
        }
    }
}

/// Price above (BUY) or below (SELL) every configured moving average.
#[derive(Debug, Clone)]
pub struct DmaModule {
    pub periods: Vec<u32>,
}

impl ConfluenceModule for DmaModule {
    fn name(&self) -> &'static str {
        "dma"
    }

    fn vote(&self, snapshot: &IndicatorSnapshot, direction: Direction) -> Vote {
        let mut values = self.periods.iter().filter_map(|&p| snapshot.dma(p)).peekable();
        if values.peek().is_none() {
            return Vote::Unavailable;
        }
        let ltp = snapshot.ltp;
        Vote::from_agreement(match direction {
            Direction::Buy => values.all(|ma| ltp > ma),
            Direction::Sell => values.all(|ma| ltp < ma),
        })
    }
}

/// Candlestick pattern polarity.
#[derive(Debug, Clone)]
pub struct PatternModule {
    pub bullish: bool,
    pub bearish: bool,
}

impl ConfluenceModule for PatternModule {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn vote(&self, snapshot: &IndicatorSnapshot, direction: Direction) -> Vote {
        let Some(polarity) = snapshot.pattern_polarity() else {
            return Vote::Unavailable;
        };
        let polarity = match polarity {
            PatternPolarity::Bullish if !self.bullish => PatternPolarity::Neutral,
            PatternPolarity::Bearish if !self.bearish => PatternPolarity::Neutral,
            p => p,
        };
        Vote::from_agreement(polarity.direction() == Some(direction))
    }
}

impl From<&PatternConfig> for PatternModule {
    fn from(cfg: &PatternConfig) -> Self {
        Self { bullish: cfg.bullish, bearish: cfg.bearish }
    }
}

/// Result of scoring one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfluenceScore {
    /// Number of agreeing modules.
    pub rank: u8,
    /// The Supertrend baseline the votes were cast against.
    pub direction: Option<Direction>,
    /// Number of modules that had data (agreeing or not).
    pub available: u8,
    pub votes: Vec<(&'static str, Vote)>,
}

impl ConfluenceScore {
    /// Score for a snapshot with no usable baseline.
    pub fn neutral() -> Self {
        Self { rank: 0, direction: None, available: 0, votes: Vec::new() }
    }

    /// rank / available, or `None` when no module had data.
    pub fn agreement_ratio(&self) -> Option<f64> {
        (self.available > 0).then(|| f64::from(self.rank) / f64::from(self.available))
    }
}

/// Scorer holding the enabled modules for one configuration.
///
/// Build once per configuration, then score any number of snapshots.
pub struct ConfluenceScorer {
    baseline_enabled: bool,
    modules: Vec<Box<dyn ConfluenceModule>>,
}

impl ConfluenceScorer {
    pub fn from_config(cfg: &TradingConfig) -> Self {
        let mut modules: Vec<Box<dyn ConfluenceModule>> = Vec::with_capacity(5);
        if cfg.rsi.enabled {
            modules.push(Box::new(RsiModule {
                overbought: cfg.rsi.overbought,
                oversold: cfg.rsi.oversold,
            }));
        }
        if cfg.ema.enabled {
            modules.push(Box::new(EmaModule));
        }
        if cfg.volume.enabled {
            modules.push(Box::new(VolumeModule));
        }
        if cfg.dma.enabled {
            modules.push(Box::new(DmaModule { periods: cfg.dma.periods.clone() }));
        }
        if cfg.patterns.enabled {
            modules.push(Box::new(PatternModule::from(&cfg.patterns)));
        }
        Self { baseline_enabled: cfg.supertrend.enabled, modules }
    }

    /// Number of enabled modules; an upper bound on any rank.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn module_names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn score(&self, snapshot: &IndicatorSnapshot) -> ConfluenceScore {
        let direction = match snapshot.supertrend_dir {
            Some(dir) if self.baseline_enabled => dir,
            _ => return ConfluenceScore::neutral(),
        };

        let votes: Vec<(&'static str, Vote)> = self
            .modules
            .iter()
            .map(|m| (m.name(), m.vote(snapshot, direction)))
            .collect();

        let rank = votes.iter().filter(|(_, v)| *v == Vote::Agrees).count() as u8;
        let available = votes.iter().filter(|(_, v)| *v != Vote::Unavailable).count() as u8;

        ConfluenceScore { rank, direction: Some(direction), available, votes }
    }
}

/// Score a single snapshot against a configuration.
pub fn score(snapshot: &IndicatorSnapshot, cfg: &TradingConfig) -> ConfluenceScore {
    ConfluenceScorer::from_config(cfg).score(snapshot)
}
