//! Reporting and export: JSON, CSV and Markdown renderings of a board and of
//! scenario results.
//!
//! Board reports carry a `schema_version` and the config fingerprint so a
//! saved file can be tied back to the settings that produced it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use signalboard_core::board::BoardStats;
use signalboard_core::config::TradingConfig;
use signalboard_core::domain::{Direction, Mode, Timeframe};
use signalboard_core::evaluate::RankedSnapshot;
use signalboard_core::mtf::{aggregate_for_mode, render_dots};
use signalboard_core::sector::SectorGroup;

use crate::scenario::{ScenarioSummary, ScenarioTrade};

pub const SCHEMA_VERSION: u32 = 1;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A rendered board: headline counts over every row, the filtered/sorted
/// view, and sector sentiment.
#[derive(Debug, Clone, Serialize)]
pub struct BoardReport<'a> {
    pub schema_version: u32,
    pub generated_at: NaiveDateTime,
    pub mode: Mode,
    pub timeframe: Timeframe,
    pub config_fingerprint: String,
    pub stats: BoardStats,
    pub rows: Vec<&'a RankedSnapshot>,
    pub sectors: Vec<SectorGroup>,
}

impl<'a> BoardReport<'a> {
    pub fn new(
        mode: Mode,
        timeframe: Timeframe,
        cfg: &TradingConfig,
        stats: BoardStats,
        rows: Vec<&'a RankedSnapshot>,
        sectors: Vec<SectorGroup>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: chrono::Local::now().naive_local(),
            mode,
            timeframe,
            config_fingerprint: cfg.fingerprint(),
            stats,
            rows,
            sectors,
        }
    }
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_board_json(report: &BoardReport<'_>) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize board report to JSON")
}

pub fn export_scenario_json(summary: &ScenarioSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize scenario summary to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

fn opt(v: Option<f64>, precision: usize) -> String {
    v.map(|x| format!("{x:.precision$}")).unwrap_or_default()
}

fn dir(d: Option<Direction>) -> &'static str {
    d.map(Direction::as_str).unwrap_or("")
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Board rows as CSV. Missing values are empty cells.
///
/// Columns: symbol, isin, sector_group, ltp, rsi, supertrend_dir, ema_signal,
/// volume_signal, confluence_rank, trade_strategy, sl, target, rr_ratio, mtf
pub fn export_board_csv(rows: &[&RankedSnapshot], mode: Mode) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "isin",
        "sector_group",
        "ltp",
        "rsi",
        "supertrend_dir",
        "ema_signal",
        "volume_signal",
        "confluence_rank",
        "trade_strategy",
        "sl",
        "target",
        "rr_ratio",
        "mtf",
    ])?;

    for r in rows {
        let s = &r.snapshot;
        wtr.write_record([
            s.symbol.as_str(),
            s.isin.as_str(),
            s.sector_group.as_deref().unwrap_or(""),
            &format!("{:.2}", s.ltp),
            &opt(s.rsi, 2),
            dir(s.supertrend_dir),
            dir(s.ema_direction()),
            s.volume_signal.map(|v| v.as_str()).unwrap_or(""),
            &r.confluence_rank().to_string(),
            r.trade_strategy().code(),
            &opt(r.sl(), 2),
            &opt(r.target(), 2),
            &r.rr_ratio().unwrap_or_default(),
            &render_dots(&aggregate_for_mode(s, mode)),
        ])?;
    }
    finish(wtr)
}

/// Sector sentiment as CSV.
pub fn export_sectors_csv(groups: &[SectorGroup]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["group_name", "total", "buy_count", "sell_count", "neutral_count", "score"])?;
    for g in groups {
        wtr.write_record([
            g.group_name.as_str(),
            &g.total.to_string(),
            &g.buy_count.to_string(),
            &g.sell_count.to_string(),
            &g.neutral_count().to_string(),
            &g.score.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Scenario trades as CSV. Prices to 2 decimals, pnl to 4.
///
/// Columns: timestamp, entered_at, symbol, action, avg_entry, tranches,
/// exit_price, exit_trigger, pnl_pct
pub fn export_trades_csv(trades: &[ScenarioTrade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "entered_at",
        "symbol",
        "action",
        "avg_entry",
        "tranches",
        "exit_price",
        "exit_trigger",
        "pnl_pct",
    ])?;

    for t in trades {
        let exited = t.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let entered = t.entered_at.format(TIMESTAMP_FORMAT).to_string();
        wtr.write_record([
            exited.as_str(),
            entered.as_str(),
            t.symbol.as_str(),
            t.action_label(),
            &format!("{:.2}", t.avg_entry),
            &t.tranches.to_string(),
            &format!("{:.2}", t.exit_price),
            t.exit_trigger.label(),
            &format!("{:.4}", t.pnl_pct),
        ])?;
    }
    finish(wtr)
}

// ─── Markdown ───────────────────────────────────────────────────────

/// Markdown table of the board view with a headline block.
pub fn board_markdown(report: &BoardReport<'_>) -> String {
    let mut md = String::with_capacity(256 + report.rows.len() * 96);
    md.push_str(&format!("# {} ({})\n\n", report.mode.title(), report.timeframe.label()));
    md.push_str(&format!(
        "Total {} | Bullish {} | Bearish {} | High confluence {}\n\n",
        report.stats.total, report.stats.bullish, report.stats.bearish, report.stats.high_confluence
    ));
    md.push_str("| Symbol | LTP | RSI | Trend | Rank | Strategy | SL | Target | R:R | MTF |\n");
    md.push_str("| --- | ---: | ---: | --- | ---: | --- | ---: | ---: | --- | --- |\n");
    for r in &report.rows {
        let s = &r.snapshot;
        md.push_str(&format!(
            "| {} | {:.2} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
            s.symbol,
            s.ltp,
            opt(s.rsi, 1),
            dir(s.supertrend_dir),
            r.confluence_rank(),
            r.trade_strategy().label(),
            opt(r.sl(), 2),
            opt(r.target(), 2),
            r.rr_ratio().unwrap_or_default(),
            render_dots(&aggregate_for_mode(s, report.mode)),
        ));
    }
    md
}

pub fn scenario_markdown(summary: &ScenarioSummary) -> String {
    let mut md = String::with_capacity(512);
    md.push_str("# Scenario Backtest\n\n");
    md.push_str("| Metric | Value |\n| --- | --- |\n");
    md.push_str(&format!("| Trades | {} |\n", summary.trades.len()));
    md.push_str(&format!("| Wins / Losses | {} / {} |\n", summary.wins, summary.losses));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", summary.win_rate));
    md.push_str(&format!("| Avg PnL | {:.4}% |\n", summary.avg_pnl_pct));
    md.push_str(&format!("| Total PnL | {:.4}% |\n", summary.total_pnl_pct));
    md
}

/// Write an artifact, creating parent directories as needed.
pub fn write_artifact(path: &Path, contents: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}
