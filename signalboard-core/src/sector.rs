//! Sector sentiment: share of Supertrend BUY symbols per sector.
//!
//! Symbols with no Supertrend direction still count toward the sector total,
//! so a sector full of undecided symbols scores low rather than being skipped.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::{Direction, IndicatorSnapshot};

/// Which classification field to group on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectorLevel {
    #[default]
    Group,
    Subgroup,
}

impl SectorLevel {
    fn key(self, snapshot: &IndicatorSnapshot) -> Option<&str> {
        let key = match self {
            SectorLevel::Group => snapshot.sector_group.as_deref(),
            SectorLevel::Subgroup => snapshot.sector_subgroup.as_deref(),
        };
        key.filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectorGroup {
    pub group_name: String,
    pub total: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    /// Bullish percentage, 0..=100.
    pub score: u8,
}

impl SectorGroup {
    /// Symbols with neither BUY nor SELL.
    pub fn neutral_count(&self) -> usize {
        self.total - self.buy_count - self.sell_count
    }
}

#[derive(Default)]
struct Tally {
    total: usize,
    buy: usize,
    sell: usize,
}

/// Aggregate by `sector_group`.
pub fn aggregate<'a, I>(snapshots: I) -> Vec<SectorGroup>
where
    I: IntoIterator<Item = &'a IndicatorSnapshot>,
{
    aggregate_by(snapshots, SectorLevel::Group)
}

/// Aggregate by the chosen level, sorted by score descending then name.
pub fn aggregate_by<'a, I>(snapshots: I, level: SectorLevel) -> Vec<SectorGroup>
where
    I: IntoIterator<Item = &'a IndicatorSnapshot>,
{
    let mut tallies: BTreeMap<&'a str, Tally> = BTreeMap::new();
    for snap in snapshots {
        let Some(name) = level.key(snap) else {
            continue;
        };
        let tally = tallies.entry(name).or_default();
        tally.total += 1;
        match snap.supertrend_dir {
            Some(Direction::Buy) => tally.buy += 1,
            Some(Direction::Sell) => tally.sell += 1,
            None => {}
        }
    }

    let mut groups: Vec<SectorGroup> = tallies
        .into_iter()
        .map(|(name, t)| SectorGroup {
            group_name: name.to_string(),
            total: t.total,
            buy_count: t.buy,
            sell_count: t.sell,
            score: bullish_score(t.buy, t.total),
        })
        .collect();

    // BTreeMap iteration already ordered by name; stable sort keeps it for ties.
    groups.sort_by(|a, b| b.score.cmp(&a.score));
    groups
}

fn bullish_score(buy: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (buy as f64 / total as f64 * 100.0).round() as u8
}
