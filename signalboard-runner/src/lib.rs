//! SignalBoard Runner: file-backed workflows on top of `signalboard-core`.
//!
//! This crate provides:
//! - Snapshot loading (bare JSON arrays or the backend's response envelope)
//! - Bar CSV loading and time-bucket resampling
//! - Snapshot building from bar series
//! - The RSI-trigger scale-in scenario backtest
//! - JSON / CSV / Markdown export of boards and scenario results

pub mod data_loader;
pub mod export;
pub mod resample;
pub mod scenario;
pub mod snapshot_builder;

pub use data_loader::{load_bars_csv, load_snapshots, parse_snapshots, BarSeries, LoadError};
pub use export::{BoardReport, SCHEMA_VERSION};
pub use resample::resample;
pub use scenario::{
    run_scenario, simulate, ExitTrigger, ScenarioError, ScenarioParams, ScenarioSummary,
    ScenarioTrade,
};
pub use snapshot_builder::{BuildError, SnapshotBuilder};
