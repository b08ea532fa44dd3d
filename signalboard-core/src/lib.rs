//! SignalBoard Core: snapshot ranking and dashboard aggregation.
//!
//! This crate holds everything that turns indicator snapshots into a board:
//! - Domain types (snapshots, directions, timeframes, modes, bars)
//! - Per-mode configuration presets with TOML overrides
//! - Confluence scoring, strategy labels and trade plans
//! - Multi-timeframe dots and sector sentiment
//! - Filtering, sorting and headline counts over a ranked board
//! - A small indicator library for building snapshots from bars
//!
//! Everything here is synchronous and pure; callers own any I/O.

pub mod board;
pub mod config;
pub mod confluence;
pub mod domain;
pub mod evaluate;
pub mod indicators;
pub mod mtf;
pub mod plan;
pub mod sector;
pub mod strategy;

pub use board::{apply, BoardFilter, BoardStats, Bucket, Sort, SortDirection, SortKey};
pub use config::{ConfigError, ConfigProfiles, TradingConfig};
pub use confluence::{ConfluenceScore, ConfluenceScorer, Vote};
pub use domain::{Direction, IndicatorSnapshot, Mode, Timeframe};
pub use evaluate::{evaluate, rank_board, rank_snapshot, Evaluation, RankedSnapshot};
pub use mtf::{MtfDirection, MtfDot};
pub use plan::TradePlan;
pub use sector::{SectorGroup, SectorLevel};
pub use strategy::TradeStrategy;
