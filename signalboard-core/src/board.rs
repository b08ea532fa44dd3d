//! Board view: filtering, sorting and headline counts.
//!
//! The engine never mutates the ranked collection. It returns references in
//! display order, so switching filters or sort keys is just another call.

use icu_collator::{Collator, CollatorOptions};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use crate::config::TradingConfig;
use crate::domain::Direction;
use crate::evaluate::RankedSnapshot;

#[derive(Debug, Error, PartialEq)]
pub enum BoardError {
    #[error("unknown sort key '{0}'")]
    SortKey(String),

    #[error("unknown bucket '{0}' (expected all, bullish, bearish or confluence)")]
    Bucket(String),

    #[error("RSI range {min}..={max} is empty")]
    EmptyRsiRange { min: f64, max: f64 },
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Directional bucket (the stat cards on the dashboard).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    #[default]
    All,
    Bullish,
    Bearish,
    HighConfluence,
}

impl FromStr for Bucket {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Bucket::All),
            "bullish" | "buy" => Ok(Bucket::Bullish),
            "bearish" | "sell" => Ok(Bucket::Bearish),
            "confluence" | "high_confluence" | "high-confluence" => Ok(Bucket::HighConfluence),
            _ => Err(BoardError::Bucket(s.to_string())),
        }
    }
}

/// Conjunction of independent row predicates. `Default` matches everything.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardFilter {
    pub bucket: Bucket,
    pub min_rank: Option<u8>,
    /// Exact `sector_group` match.
    pub sector: Option<String>,
    /// Case-insensitive substring of symbol or ISIN.
    pub search: Option<String>,
    /// Inclusive; rows without RSI never match a range.
    pub rsi_range: Option<RangeInclusive<f64>>,
    /// Threshold used by [`Bucket::HighConfluence`].
    pub high_confluence_rank: u8,
}

impl Default for BoardFilter {
    fn default() -> Self {
        Self {
            bucket: Bucket::All,
            min_rank: None,
            sector: None,
            search: None,
            rsi_range: None,
            high_confluence_rank: 3,
        }
    }
}

impl BoardFilter {
    /// Empty filter using the configuration's high-confluence threshold.
    pub fn for_config(cfg: &TradingConfig) -> Self {
        Self {
            high_confluence_rank: cfg.strategy.high_confluence_rank,
            ..Self::default()
        }
    }

    /// Set an inclusive RSI range; a missing bound is open.
    pub fn with_rsi_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Result<Self, BoardError> {
        if min.is_none() && max.is_none() {
            self.rsi_range = None;
            return Ok(self);
        }
        let (min, max) = (min.unwrap_or(f64::NEG_INFINITY), max.unwrap_or(f64::INFINITY));
        if min > max {
            return Err(BoardError::EmptyRsiRange { min, max });
        }
        self.rsi_range = Some(min..=max);
        Ok(self)
    }

    pub fn matches(&self, row: &RankedSnapshot) -> bool {
        let snap = &row.snapshot;

        let in_bucket = match self.bucket {
            Bucket::All => true,
            Bucket::Bullish => snap.supertrend_dir == Some(Direction::Buy),
            Bucket::Bearish => snap.supertrend_dir == Some(Direction::Sell),
            Bucket::HighConfluence => row.confluence_rank() >= self.high_confluence_rank,
        };
        if !in_bucket {
            return false;
        }

        if self.min_rank.is_some_and(|min| row.confluence_rank() < min) {
            return false;
        }

        if let Some(sector) = &self.sector {
            if snap.sector_group.as_deref() != Some(sector.as_str()) {
                return false;
            }
        }

        if let Some(query) = self.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let query = query.to_lowercase();
            let hit = snap.symbol.to_lowercase().contains(&query)
                || snap.isin.to_lowercase().contains(&query);
            if !hit {
                return false;
            }
        }

        if let Some(range) = &self.rsi_range {
            match snap.rsi {
                Some(rsi) if range.contains(&rsi) => {}
                _ => return false,
            }
        }

        true
    }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Symbol,
    Isin,
    Sector,
    Strategy,
    Ltp,
    Rsi,
    Rank,
    VolumeRatio,
    Supertrend,
    Sl,
    Target,
    Pe,
    Roe,
}

impl SortKey {
    pub const ALL: [SortKey; 13] = [
        SortKey::Symbol,
        SortKey::Isin,
        SortKey::Sector,
        SortKey::Strategy,
        SortKey::Ltp,
        SortKey::Rsi,
        SortKey::Rank,
        SortKey::VolumeRatio,
        SortKey::Supertrend,
        SortKey::Sl,
        SortKey::Target,
        SortKey::Pe,
        SortKey::Roe,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SortKey::Symbol => "symbol",
            SortKey::Isin => "isin",
            SortKey::Sector => "sector",
            SortKey::Strategy => "strategy",
            SortKey::Ltp => "ltp",
            SortKey::Rsi => "rsi",
            SortKey::Rank => "rank",
            SortKey::VolumeRatio => "volume_ratio",
            SortKey::Supertrend => "supertrend",
            SortKey::Sl => "sl",
            SortKey::Target => "target",
            SortKey::Pe => "pe",
            SortKey::Roe => "roe",
        }
    }

    pub fn is_text(self) -> bool {
        matches!(self, SortKey::Symbol | SortKey::Isin | SortKey::Sector | SortKey::Strategy)
    }

    fn extract(self, row: &RankedSnapshot) -> SortValue {
        let snap = &row.snapshot;
        match self {
            SortKey::Symbol => SortValue::text(&snap.symbol),
            SortKey::Isin => SortValue::text(&snap.isin),
            SortKey::Sector => SortValue::text(snap.sector_group.as_deref().unwrap_or("")),
            SortKey::Strategy => SortValue::text(row.trade_strategy().code()),
            SortKey::Ltp => SortValue::number(Some(snap.ltp)),
            SortKey::Rsi => SortValue::number(snap.rsi),
            SortKey::Rank => SortValue::number(Some(f64::from(row.confluence_rank()))),
            SortKey::VolumeRatio => SortValue::number(snap.volume_ratio),
            SortKey::Supertrend => SortValue::number(snap.supertrend_value),
            SortKey::Sl => SortValue::number(row.sl()),
            SortKey::Target => SortValue::number(row.target()),
            SortKey::Pe => SortValue::number(snap.pe),
            SortKey::Roe => SortValue::number(snap.roe),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SortKey {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let alias = match lower.as_str() {
            "confluence_rank" | "confluence" => "rank",
            "trade_strategy" => "strategy",
            "sector_group" => "sector",
            "supertrend_value" => "supertrend",
            other => other,
        };
        SortKey::ALL
            .into_iter()
            .find(|k| k.name() == alias)
            .ok_or_else(|| BoardError::SortKey(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn toggle(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }
}

enum SortValue {
    Text(String),
    Number(Option<f64>),
}

impl SortValue {
    fn text(s: &str) -> Self {
        SortValue::Text(s.to_string())
    }

    fn number(v: Option<f64>) -> Self {
        SortValue::Number(v.filter(|x| !x.is_nan()))
    }

    fn compare(&self, other: &Self, collation: &TextCollation, direction: SortDirection) -> Ordering {
        match (self, other) {
            (SortValue::Text(a), SortValue::Text(b)) => directed(collation.compare(a, b), direction),
            (SortValue::Number(a), SortValue::Number(b)) => NullsLast::compare(*a, *b, direction),
            // Keys never mix kinds within one column.
            _ => Ordering::Equal,
        }
    }
}

/// Ordering for text columns: Unicode collation with the CLDR root rules,
/// so accented letters sort with their base letter, case is a tie-break and
/// punctuation sorts before digits.
pub struct TextCollation {
    collator: Option<Collator>,
}

impl TextCollation {
    pub fn root() -> Self {
        let collator = Collator::try_new(&Default::default(), CollatorOptions::new())
            .map_err(|e| warn!(error = %e, "collation data unavailable, text columns sort by lowercase code point"))
            .ok();
        Self { collator }
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match &self.collator {
            Some(collator) => collator.compare(a, b),
            None => a.to_lowercase().cmp(&b.to_lowercase()),
        }
    }
}

fn directed(ord: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}

/// Null ordering for numeric columns: missing values go last whichever way
/// the column is sorted.
pub struct NullsLast;

impl NullsLast {
    pub fn compare(a: Option<f64>, b: Option<f64>, direction: SortDirection) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => directed(a.total_cmp(&b), direction),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Filter then sort. `sort = None` keeps input order.
pub fn apply<'a>(
    rows: &'a [RankedSnapshot],
    filter: &BoardFilter,
    sort: Option<Sort>,
) -> Vec<&'a RankedSnapshot> {
    let filtered = rows.iter().filter(|row| filter.matches(row));
    let Some(sort) = sort else {
        return filtered.collect();
    };

    let collation = if sort.key.is_text() {
        TextCollation::root()
    } else {
        TextCollation { collator: None }
    };
    let mut keyed: Vec<(SortValue, &'a RankedSnapshot)> =
        filtered.map(|row| (sort.key.extract(row), row)).collect();
    // `sort_by` is stable: ties keep input order.
    keyed.sort_by(|(a, _), (b, _)| a.compare(b, &collation, sort.direction));
    keyed.into_iter().map(|(_, row)| row).collect()
}

// ---------------------------------------------------------------------------
// Headline counts
// ---------------------------------------------------------------------------

/// Counts over the unfiltered board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BoardStats {
    pub total: usize,
    pub bullish: usize,
    pub bearish: usize,
    pub high_confluence: usize,
}

impl BoardStats {
    pub fn compute(rows: &[RankedSnapshot], cfg: &TradingConfig) -> Self {
        let high = cfg.strategy.high_confluence_rank;
        rows.iter().fold(Self::default(), |mut stats, row| {
            stats.total += 1;
            match row.snapshot.supertrend_dir {
                Some(Direction::Buy) => stats.bullish += 1,
                Some(Direction::Sell) => stats.bearish += 1,
                None => {}
            }
            if row.confluence_rank() >= high {
                stats.high_confluence += 1;
            }
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IndicatorSnapshot;
    use crate::evaluate::{rank_snapshot, Evaluation};

    fn row(symbol: &str, rsi: Option<f64>, dir: Option<Direction>) -> RankedSnapshot {
        let mut s = IndicatorSnapshot::new(symbol, format!("INE{symbol}01"), 100.0);
        s.rsi = rsi;
        s.supertrend_dir = dir;
        rank_snapshot(s, &TradingConfig::swing())
    }

    fn ranked(symbol: &str, rank: u8) -> RankedSnapshot {
        let snap = IndicatorSnapshot::new(symbol, format!("INE{symbol}01"), 100.0);
        let mut evaluation = Evaluation::neutral();
        evaluation.score.rank = rank;
        RankedSnapshot::new(snap, evaluation)
    }

    fn symbols(rows: &[&RankedSnapshot]) -> Vec<String> {
        rows.iter().map(|r| r.snapshot.symbol.clone()).collect()
    }

    // -----------------------------------------------------------------------
    // Filters
    // -----------------------------------------------------------------------

    #[test]
    fn default_filter_keeps_everything_in_order() {
        let rows = vec![row("B", None, None), row("A", Some(50.0), Some(Direction::Buy))];
        let out = apply(&rows, &BoardFilter::default(), None);
        assert_eq!(symbols(&out), vec!["B", "A"]);
    }

    #[test]
    fn rsi_range_excludes_missing_rsi() {
        let rows = vec![
            row("NULL", None, None),
            row("LOW", Some(29.9), None),
            row("EDGE", Some(30.0), None),
            row("MID", Some(55.0), None),
            row("TOP", Some(70.0), None),
        ];
        let filter = BoardFilter::default().with_rsi_bounds(Some(30.0), Some(70.0)).unwrap();
        let out = apply(&rows, &filter, None);
        assert_eq!(symbols(&out), vec!["EDGE", "MID", "TOP"]);
    }

    #[test]
    fn open_rsi_bound() {
        let rows = vec![row("A", Some(20.0), None), row("B", Some(90.0), None), row("C", None, None)];
        let filter = BoardFilter::default().with_rsi_bounds(Some(50.0), None).unwrap();
        assert_eq!(symbols(&apply(&rows, &filter, None)), vec!["B"]);
        assert!(BoardFilter::default().with_rsi_bounds(Some(70.0), Some(30.0)).is_err());
    }

    #[test]
    fn search_matches_symbol_or_isin_case_insensitively() {
        let rows = vec![row("INFY", None, None), row("TCS", None, None)];
        let mut filter = BoardFilter::default();
        filter.search = Some("inf".into());
        assert_eq!(symbols(&apply(&rows, &filter, None)), vec!["INFY"]);
        filter.search = Some("inetcs".into());
        assert_eq!(symbols(&apply(&rows, &filter, None)), vec!["TCS"]);
        filter.search = Some("   ".into());
        assert_eq!(apply(&rows, &filter, None).len(), 2);
    }

    #[test]
    fn buckets_and_sector_compose() {
        let mut rows = vec![
            row("A", None, Some(Direction::Buy)),
            row("B", None, Some(Direction::Sell)),
            row("C", None, Some(Direction::Buy)),
            row("D", None, None),
        ];
        rows[0].snapshot.sector_group = Some("IT".into());
        rows[2].snapshot.sector_group = Some("Banks".into());

        let mut filter = BoardFilter { bucket: Bucket::Bullish, ..BoardFilter::default() };
        assert_eq!(symbols(&apply(&rows, &filter, None)), vec!["A", "C"]);
        filter.sector = Some("IT".into());
        assert_eq!(symbols(&apply(&rows, &filter, None)), vec!["A"]);
        filter.bucket = Bucket::Bearish;
        assert!(apply(&rows, &filter, None).is_empty());
    }

    #[test]
    fn rank_filters() {
        let rows = vec![ranked("A", 4), ranked("B", 2), ranked("C", 3)];
        let filter = BoardFilter { bucket: Bucket::HighConfluence, ..BoardFilter::default() };
        assert_eq!(symbols(&apply(&rows, &filter, None)), vec!["A", "C"]);
        let filter = BoardFilter { min_rank: Some(4), ..BoardFilter::default() };
        assert_eq!(symbols(&apply(&rows, &filter, None)), vec!["A"]);
    }

    // -----------------------------------------------------------------------
    // Sorting
    // -----------------------------------------------------------------------

    #[test]
    fn nulls_stay_last_in_both_directions() {
        let rows = vec![
            row("A", Some(55.0), None),
            row("B", None, None),
            row("C", Some(80.0), None),
        ];
        let f = BoardFilter::default();
        let desc = apply(&rows, &f, Some(Sort::new(SortKey::Rsi, SortDirection::Desc)));
        assert_eq!(symbols(&desc), vec!["C", "A", "B"]);
        let asc = apply(&rows, &f, Some(Sort::new(SortKey::Rsi, SortDirection::Asc)));
        assert_eq!(symbols(&asc), vec!["A", "C", "B"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let rows = vec![
            row("Z", Some(60.0), None),
            row("Y", Some(60.0), None),
            row("X", Some(60.0), None),
        ];
        let out = apply(&rows, &BoardFilter::default(), Some(Sort::new(SortKey::Rsi, SortDirection::Desc)));
        assert_eq!(symbols(&out), vec!["Z", "Y", "X"]);
    }

    #[test]
    fn text_sort_is_case_insensitive() {
        let rows = vec![row("beta", None, None), row("Alpha", None, None), row("GAMMA", None, None)];
        let out = apply(&rows, &BoardFilter::default(), Some(Sort::new(SortKey::Symbol, SortDirection::Asc)));
        assert_eq!(symbols(&out), vec!["Alpha", "beta", "GAMMA"]);
    }

    #[test]
    fn text_sort_collates_accents_and_punctuation() {
        let rows = vec![
            row("zeta", None, None),
            row("Éclair", None, None),
            row("a_b", None, None),
            row("a1", None, None),
        ];
        let f = BoardFilter::default();
        let asc = apply(&rows, &f, Some(Sort::new(SortKey::Symbol, SortDirection::Asc)));
        assert_eq!(symbols(&asc), vec!["a_b", "a1", "Éclair", "zeta"]);
        let desc = apply(&rows, &f, Some(Sort::new(SortKey::Symbol, SortDirection::Desc)));
        assert_eq!(symbols(&desc), vec!["zeta", "Éclair", "a1", "a_b"]);
    }

    #[test]
    fn collation_orders_base_letters_before_case() {
        let c = TextCollation::root();
        assert_eq!(c.compare("émile", "Ezra"), Ordering::Less);
        assert_eq!(c.compare("abc", "ABD"), Ordering::Less);
        assert_ne!(c.compare("abc", "ABC"), Ordering::Equal);
    }

    #[test]
    fn source_is_not_mutated() {
        let rows = vec![row("B", Some(10.0), None), row("A", Some(20.0), None)];
        let before = rows.clone();
        let _ = apply(&rows, &BoardFilter::default(), Some(Sort::new(SortKey::Symbol, SortDirection::Asc)));
        assert_eq!(rows, before);
    }

    #[test]
    fn nulls_last_policy() {
        use SortDirection::*;
        assert_eq!(NullsLast::compare(Some(1.0), None, Asc), Ordering::Less);
        assert_eq!(NullsLast::compare(Some(1.0), None, Desc), Ordering::Less);
        assert_eq!(NullsLast::compare(None, Some(1.0), Desc), Ordering::Greater);
        assert_eq!(NullsLast::compare(Some(1.0), Some(2.0), Desc), Ordering::Greater);
        assert_eq!(NullsLast::compare(None, None, Asc), Ordering::Equal);
    }

    #[test]
    fn parses_keys_and_buckets() {
        assert_eq!("confluence_rank".parse::<SortKey>(), Ok(SortKey::Rank));
        assert_eq!("RSI".parse::<SortKey>(), Ok(SortKey::Rsi));
        assert!("colour".parse::<SortKey>().is_err());
        assert_eq!("confluence".parse::<Bucket>(), Ok(Bucket::HighConfluence));
        assert_eq!(SortDirection::Asc.toggle(), SortDirection::Desc);
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    #[test]
    fn stats_count_unfiltered_rows() {
        let mut rows = vec![ranked("A", 3), ranked("B", 0), ranked("C", 0)];
        rows[0].snapshot.supertrend_dir = Some(Direction::Buy);
        rows[1].snapshot.supertrend_dir = Some(Direction::Sell);
        let stats = BoardStats::compute(&rows, &TradingConfig::swing());
        assert_eq!(
            stats,
            BoardStats { total: 3, bullish: 1, bearish: 1, high_confluence: 1 }
        );
    }
}
