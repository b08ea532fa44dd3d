//! Timeframes and trading modes.
//!
//! A mode owns a canonical list of timeframes ordered shortest to longest;
//! that order drives the MTF dot sequence and the default timeframe.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unknown timeframe '{0}' (expected one of 5m, 15m, 30m, 60m, 1d, 1w, 1mo)")]
    Timeframe(String),

    #[error("unknown mode '{0}' (expected swing or intraday)")]
    Mode(String),
}

/// Candle timeframe. Variant order is shortest to longest, so the derived
/// `Ord` matches chronological granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "60m")]
    M60,
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "1w")]
    Weekly,
    #[serde(rename = "1mo")]
    Monthly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::M60,
        Timeframe::Daily,
        Timeframe::Weekly,
        Timeframe::Monthly,
    ];

    /// Wire code used by the backend and as the `mtf_data` key.
    pub fn code(self) -> &'static str {
        match self {
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::M60 => "60m",
            Timeframe::Daily => "1d",
            Timeframe::Weekly => "1w",
            Timeframe::Monthly => "1mo",
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::M60 => "60m",
            Timeframe::Daily => "Daily",
            Timeframe::Weekly => "Weekly",
            Timeframe::Monthly => "Monthly",
        }
    }

    /// Nominal bar length in minutes (trading-calendar agnostic).
    pub fn minutes(self) -> u32 {
        match self {
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::M60 => 60,
            Timeframe::Daily => 1_440,
            Timeframe::Weekly => 10_080,
            Timeframe::Monthly => 43_200,
        }
    }

    pub fn is_intraday(self) -> bool {
        self.minutes() < Timeframe::Daily.minutes()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Timeframe {
    type Err = ParseError;

    /// Accepts either the wire code (`"1d"`) or the display label (`"Daily"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Timeframe::ALL
            .into_iter()
            .find(|tf| {
                tf.code().eq_ignore_ascii_case(trimmed) || tf.label().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| ParseError::Timeframe(s.to_string()))
    }
}

/// Trading mode. Each mode has its own configuration profile and timeframe set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Swing,
    Intraday,
}

impl Mode {
    pub fn title(self) -> &'static str {
        match self {
            Mode::Swing => "Swing Trading Dashboard",
            Mode::Intraday => "Intraday Momentum",
        }
    }

    /// Canonical timeframe order for the mode, shortest to longest.
    pub fn timeframes(self) -> &'static [Timeframe] {
        match self {
            Mode::Swing => &[Timeframe::Daily, Timeframe::Weekly, Timeframe::Monthly],
            Mode::Intraday => &[Timeframe::M5, Timeframe::M15, Timeframe::M30, Timeframe::M60],
        }
    }

    pub fn default_timeframe(self) -> Timeframe {
        self.timeframes()[0]
    }

    /// Typical universe size; used only to pre-size collections.
    pub fn universe_hint(self) -> usize {
        match self {
            Mode::Swing => 5000,
            Mode::Intraday => 200,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Swing => "swing",
            Mode::Intraday => "intraday",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "swing" => Ok(Mode::Swing),
            "intraday" => Ok(Mode::Intraday),
            _ => Err(ParseError::Mode(s.to_string())),
        }
    }
}
