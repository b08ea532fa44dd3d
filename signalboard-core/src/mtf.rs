//! Multi-timeframe alignment dots.
//!
//! One dot per timeframe of the active mode, in the mode's canonical order.
//! A timeframe with no direction yet is shown as UNKNOWN rather than hidden,
//! so the dot row always has the same width.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::{Direction, IndicatorSnapshot, Mode, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MtfDirection {
    Buy,
    Sell,
    Unknown,
}

impl MtfDirection {
    /// Wire name, as in the backend's `mtf_data`.
    pub fn as_str(self) -> &'static str {
        match self {
            MtfDirection::Buy => "BUY",
            MtfDirection::Sell => "SELL",
            MtfDirection::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for MtfDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Option<Direction>> for MtfDirection {
    fn from(dir: Option<Direction>) -> Self {
        match dir {
            Some(Direction::Buy) => MtfDirection::Buy,
            Some(Direction::Sell) => MtfDirection::Sell,
            None => MtfDirection::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MtfDot {
    pub timeframe: Timeframe,
    pub direction: MtfDirection,
}

/// Build the dot row for `timeframes`, keyed by timeframe code in `mtf_data`.
pub fn aggregate(mtf_data: &BTreeMap<String, Direction>, timeframes: &[Timeframe]) -> Vec<MtfDot> {
    timeframes
        .iter()
        .map(|&timeframe| MtfDot {
            timeframe,
            direction: mtf_data.get(timeframe.code()).copied().into(),
        })
        .collect()
}

pub fn aggregate_for_mode(snapshot: &IndicatorSnapshot, mode: Mode) -> Vec<MtfDot> {
    aggregate(&snapshot.mtf_data, mode.timeframes())
}

/// Compact text form, e.g. `"▲▼·"`.
pub fn render_dots(dots: &[MtfDot]) -> String {
    dots.iter()
        .map(|d| match d.direction {
            MtfDirection::Buy => '▲',
            MtfDirection::Sell => '▼',
            MtfDirection::Unknown => '·',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swing_dots_in_canonical_order() {
        let mut data = BTreeMap::new();
        data.insert("1mo".to_string(), Direction::Sell);
        data.insert("1d".to_string(), Direction::Buy);
        let dots = aggregate(&data, Mode::Swing.timeframes());
        assert_eq!(
            dots,
            vec![
                MtfDot { timeframe: Timeframe::Daily, direction: MtfDirection::Buy },
                MtfDot { timeframe: Timeframe::Weekly, direction: MtfDirection::Unknown },
                MtfDot { timeframe: Timeframe::Monthly, direction: MtfDirection::Sell },
            ]
        );
        assert_eq!(render_dots(&dots), "▲·▼");
    }

    #[test]
    fn empty_data_is_all_unknown() {
        let snap = IndicatorSnapshot::new("X", "I", 1.0);
        let dots = aggregate_for_mode(&snap, Mode::Intraday);
        assert_eq!(dots.len(), Mode::Intraday.timeframes().len());
        assert!(dots.iter().all(|d| d.direction == MtfDirection::Unknown));
    }

    #[test]
    fn codes_outside_the_mode_are_ignored() {
        let mut snap = IndicatorSnapshot::new("X", "I", 1.0);
        snap.mtf_data.insert("1d".into(), Direction::Buy);
        snap.mtf_data.insert("15m".into(), Direction::Sell);
        let dots = aggregate_for_mode(&snap, Mode::Intraday);
        let tfs: Vec<_> = dots.iter().map(|d| d.timeframe).collect();
        assert_eq!(tfs, Mode::Intraday.timeframes().to_vec());
        assert_eq!(dots[1].direction, MtfDirection::Sell);
        assert!(!tfs.contains(&Timeframe::Daily));
    }

    #[test]
    fn serializes_with_codes() {
        let dot = MtfDot { timeframe: Timeframe::M15, direction: MtfDirection::Unknown };
        let json = serde_json::to_string(&dot).unwrap();
        assert_eq!(json, r#"{"timeframe":"15m","direction":"UNKNOWN"}"#);
    }

    #[test]
    fn display_uses_wire_names() {
        for d in [MtfDirection::Buy, MtfDirection::Sell, MtfDirection::Unknown] {
            let json = serde_json::to_string(&d).unwrap();
            assert_eq!(json.trim_matches('"'), d.to_string());
        }
        assert_eq!(MtfDirection::from(None).to_string(), "UNKNOWN");
    }
}
