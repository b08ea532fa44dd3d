//! Directional enums shared by every indicator module.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional bias of an indicator reading.
///
/// An unknown direction (indicator not yet computed, or warming up) is
/// modelled as `Option<Direction>::None` rather than a third variant, so
/// that "unknown" can never be confused with either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }

    /// +1 for Buy, -1 for Sell. Used to mirror long/short arithmetic.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Volume anomaly classification produced upstream.
///
/// A spike is a bar whose volume exceeds the configured multiple of its
/// average volume; the polarity comes from the candle body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeSignal {
    BullSpike,
    BearSpike,
    Normal,
}

impl VolumeSignal {
    /// The spike that confirms a given direction.
    pub fn confirming(direction: Direction) -> Self {
        match direction {
            Direction::Buy => VolumeSignal::BullSpike,
            Direction::Sell => VolumeSignal::BearSpike,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VolumeSignal::BullSpike => "BULL_SPIKE",
            VolumeSignal::BearSpike => "BEAR_SPIKE",
            VolumeSignal::Normal => "NORMAL",
        }
    }
}

/// Polarity of a candlestick pattern label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternPolarity {
    Bullish,
    Bearish,
    Neutral,
}

impl PatternPolarity {
    /// Classify a pattern label by its "Bullish"/"Bearish" substring.
    ///
    /// Labels carrying both polarities (e.g. `"Bullish Hammer | Bearish Engulfing"`)
    /// and labels carrying neither are neutral.
    pub fn from_label(label: &str) -> Self {
        let bullish = label.contains("Bullish");
        let bearish = label.contains("Bearish");
        match (bullish, bearish) {
            (true, false) => PatternPolarity::Bullish,
            (false, true) => PatternPolarity::Bearish,
            _ => PatternPolarity::Neutral,
        }
    }

    /// The direction this polarity supports, if any.
    pub fn direction(self) -> Option<Direction> {
        match self {
            PatternPolarity::Bullish => Some(Direction::Buy),
            PatternPolarity::Bearish => Some(Direction::Sell),
            PatternPolarity::Neutral => None,
        }
    }
}
