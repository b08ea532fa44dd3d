//! RSI-trigger scale-in scenario backtest.
//!
//! The simulation walks base bars (normally 5m) and reads RSI from a coarser
//! primary timeframe:
//!
//! 1. Base bars are resampled into primary buckets; RSI is computed on the
//!    primary closes and shifted by one primary bar, so a base bar only sees
//!    the RSI of the last *completed* bucket. Values are carried forward onto
//!    base bars as-of the bucket start.
//! 2. Supertrend direction is computed on the base bars.
//! 3. Flat: enter tranche 1 (50%) at the close when `rsi_min <= rsi <= rsi_max`.
//! 4. In a position, per bar and in this order:
//!    - stop loss at `avg_entry * (1 ∓ stop_loss_pct%)` closes everything;
//!    - an adverse move of `scale_in_step_pct%` from the last fill adds the
//!      next tranche (25%, then 25%), re-weighting the average entry;
//!    - `avg_entry * (1 ± target_pct%)` or a base Supertrend flip against the
//!      position closes everything.
//!
//! A position still open at the end of the data is not reported.

use chrono::{NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use signalboard_core::domain::{Bar, Direction, Timeframe};
use signalboard_core::indicators::{supertrend_direction, Rsi};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use crate::data_loader::BarSeries;
use crate::resample::resample;

/// Position weights for tranches 1..=3.
pub const TRANCHE_WEIGHTS: [f64; 3] = [0.50, 0.25, 0.25];

#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    #[error("invalid scenario parameter {field}: {reason}")]
    InvalidParams { field: &'static str, reason: String },

    #[error("no matching symbols found")]
    NoSymbols,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParams {
    /// First session simulated. Earlier bars only warm up the indicators.
    pub start: Option<NaiveDate>,
    /// Last session simulated (inclusive).
    pub end: Option<NaiveDate>,
    /// Timeframe RSI is read from.
    pub primary: Timeframe,
    pub action: Direction,
    pub rsi_min: f64,
    pub rsi_max: f64,
    /// Percent, e.g. 0.21 for 0.21%.
    pub stop_loss_pct: f64,
    pub target_pct: f64,
    pub scale_in_step_pct: f64,
    pub rsi_period: usize,
    pub st_period: usize,
    pub st_multiplier: f64,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            primary: Timeframe::M15,
            action: Direction::Buy,
            rsi_min: 26.0,
            rsi_max: 32.0,
            stop_loss_pct: 0.21,
            target_pct: 0.49,
            scale_in_step_pct: 0.1,
            rsi_period: 14,
            st_period: 10,
            st_multiplier: 3.0,
        }
    }
}

impl ScenarioParams {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ScenarioError {
            ScenarioError::InvalidParams { field, reason: reason.into() }
        }

        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(self.rsi_min) || !in_range(self.rsi_max) {
            return Err(invalid("rsi", "bounds must lie in [0, 100]"));
        }
        if self.rsi_min > self.rsi_max {
            return Err(invalid(
                "rsi",
                format!("rsi_min ({}) exceeds rsi_max ({})", self.rsi_min, self.rsi_max),
            ));
        }
        if !(self.stop_loss_pct > 0.0 && self.stop_loss_pct < 100.0) {
            return Err(invalid("stop_loss_pct", "must be in (0, 100)"));
        }
        if !(self.target_pct > 0.0) {
            return Err(invalid("target_pct", "must be > 0"));
        }
        if !(self.scale_in_step_pct >= 0.0) {
            return Err(invalid("scale_in_step_pct", "must be >= 0"));
        }
        if self.rsi_period == 0 || self.st_period == 0 {
            return Err(invalid("period", "indicator periods must be >= 1"));
        }
        if !(self.st_multiplier > 0.0) {
            return Err(invalid("st_multiplier", "must be > 0"));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(invalid("start", format!("{start} is after end {end}")));
            }
        }
        Ok(())
    }

    fn in_window(&self, ts: NaiveDateTime) -> bool {
        let date = ts.date();
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitTrigger {
    StopLoss,
    Target,
    SupertrendBreak,
}

impl ExitTrigger {
    pub fn label(self) -> &'static str {
        match self {
            ExitTrigger::StopLoss => "Stop Loss",
            ExitTrigger::Target => "Target 1",
            ExitTrigger::SupertrendBreak => "Supertrend Break",
        }
    }
}

impl fmt::Display for ExitTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One closed scenario position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTrade {
    /// Exit bar timestamp.
    pub timestamp: NaiveDateTime,
    pub entered_at: NaiveDateTime,
    pub symbol: String,
    pub action: Direction,
    pub avg_entry: f64,
    pub tranches: u8,
    pub exit_price: f64,
    pub exit_trigger: ExitTrigger,
    pub pnl_pct: f64,
}

impl ScenarioTrade {
    pub fn action_label(&self) -> &'static str {
        match self.action {
            Direction::Buy => "BUY (Long)",
            Direction::Sell => "SELL (Short)",
        }
    }

    pub fn is_win(&self) -> bool {
        self.pnl_pct > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub trades: Vec<ScenarioTrade>,
    pub wins: usize,
    pub losses: usize,
    /// Percent of trades with positive pnl; 0 with no trades.
    pub win_rate: f64,
    pub avg_pnl_pct: f64,
    pub total_pnl_pct: f64,
}

impl ScenarioSummary {
    pub fn from_trades(trades: Vec<ScenarioTrade>) -> Self {
        let wins = trades.iter().filter(|t| t.is_win()).count();
        let losses = trades.iter().filter(|t| t.pnl_pct < 0.0).count();
        let total_pnl_pct: f64 = trades.iter().map(|t| t.pnl_pct).sum();
        let (win_rate, avg_pnl_pct) = if trades.is_empty() {
            (0.0, 0.0)
        } else {
            let n = trades.len() as f64;
            (wins as f64 / n * 100.0, total_pnl_pct / n)
        };
        Self { trades, wins, losses, win_rate, avg_pnl_pct, total_pnl_pct }
    }
}

struct Position {
    entered_at: NaiveDateTime,
    fills: Vec<f64>,
}

impl Position {
    fn avg_entry(&self) -> f64 {
        let (notional, weight) = self
            .fills
            .iter()
            .zip(TRANCHE_WEIGHTS)
            .fold((0.0, 0.0), |(n, w), (&price, weight)| (n + price * weight, w + weight));
        notional / weight
    }

    fn last_fill(&self) -> f64 {
        self.fills.last().copied().unwrap_or(f64::NAN)
    }

    fn close(&self, bar: &Bar, action: Direction, trigger: ExitTrigger) -> ScenarioTrade {
        let avg_entry = self.avg_entry();
        ScenarioTrade {
            timestamp: bar.timestamp,
            entered_at: self.entered_at,
            symbol: bar.symbol.clone(),
            action,
            avg_entry,
            tranches: self.fills.len() as u8,
            exit_price: bar.close,
            exit_trigger: trigger,
            pnl_pct: (bar.close - avg_entry) / avg_entry * action.sign() * 100.0,
        }
    }
}

/// Primary-timeframe RSI, shifted one primary bar and carried onto each base bar.
fn primary_rsi_on_base(bars: &[Bar], params: &ScenarioParams) -> Vec<f64> {
    let primary = resample(bars, params.primary);
    let closes: Vec<f64> = primary.iter().map(|b| b.close).collect();
    let rsi = Rsi::new(params.rsi_period).over(&closes);

    let mut out = Vec::with_capacity(bars.len());
    let mut j = 0usize;
    for bar in bars {
        while j + 1 < primary.len() && primary[j + 1].timestamp <= bar.timestamp {
            j += 1;
        }
        let value = match primary.get(j) {
            Some(p) if p.timestamp <= bar.timestamp && j > 0 => rsi[j - 1],
            _ => f64::NAN,
        };
        out.push(value);
    }
    out
}

/// Simulate one symbol. Params are assumed valid.
pub fn simulate(bars: &[Bar], params: &ScenarioParams) -> Vec<ScenarioTrade> {
    let rsi = primary_rsi_on_base(bars, params);
    let base_trend = supertrend_direction(bars, params.st_period, params.st_multiplier);

    let action = params.action;
    let m = action.sign();
    let stop_frac = params.stop_loss_pct / 100.0;
    let target_frac = params.target_pct / 100.0;
    let step_frac = params.scale_in_step_pct / 100.0;
    // Adverse for longs is down, for shorts up.
    let reached = |price: f64, level: f64| if m > 0.0 { price <= level } else { price >= level };

    let mut trades = Vec::new();
    let mut position: Option<Position> = None;

    for (i, bar) in bars.iter().enumerate() {
        if !params.in_window(bar.timestamp) || bar.is_void() {
            continue;
        }
        let price = bar.close;

        if position.is_none() {
            let r = rsi[i];
            if !r.is_nan() && params.rsi_min <= r && r <= params.rsi_max {
                position = Some(Position { entered_at: bar.timestamp, fills: vec![price] });
            }
            continue;
        }
        let Some(pos) = position.as_mut() else { continue };

        let stop = pos.avg_entry() * (1.0 - stop_frac * m);
        if reached(price, stop) {
            trades.push(pos.close(bar, action, ExitTrigger::StopLoss));
            position = None;
            continue;
        }

        if pos.fills.len() < TRANCHE_WEIGHTS.len() {
            let next = pos.last_fill() * (1.0 - step_frac * m);
            if reached(price, next) {
                pos.fills.push(price);
            }
        }

        let target = pos.avg_entry() * (1.0 + target_frac * m);
        let hit_target = if m > 0.0 { price >= target } else { price <= target };
        let trigger = if hit_target {
            Some(ExitTrigger::Target)
        } else if base_trend[i] == Some(action.opposite()) {
            Some(ExitTrigger::SupertrendBreak)
        } else {
            None
        };
        if let Some(trigger) = trigger {
            trades.push(pos.close(bar, action, trigger));
            position = None;
        }
    }

    if let (Some(pos), Some(last)) = (&position, bars.last()) {
        debug!(symbol = %last.symbol, fills = pos.fills.len(), "position still open at end of data");
    }
    trades
}

/// Run the scenario across symbols in parallel. `symbol` restricts the run to
/// one symbol (case-insensitive; `"ALL"` means every symbol).
///
/// Trades come back in exit-time order, ties broken by symbol.
pub fn run_scenario(
    series: &BarSeries,
    symbol: Option<&str>,
    params: &ScenarioParams,
) -> Result<ScenarioSummary, ScenarioError> {
    params.validate()?;
    let wanted = symbol.map(str::trim).filter(|s| !s.eq_ignore_ascii_case("ALL"));
    let selected: Vec<(&String, &Vec<Bar>)> = series
        .iter()
        .filter(|(sym, _)| wanted.map_or(true, |w| sym.eq_ignore_ascii_case(w)))
        .collect();
    if selected.is_empty() {
        return Err(ScenarioError::NoSymbols);
    }

    let mut trades: Vec<ScenarioTrade> = selected
        .par_iter()
        .flat_map_iter(|(sym, bars)| {
            debug!(symbol = %sym, bars = bars.len(), "running scenario");
            simulate(bars, params)
        })
        .collect();
    trades.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.symbol.cmp(&b.symbol)));

    let summary = ScenarioSummary::from_trades(trades);
    info!(
        symbols = selected.len(),
        trades = summary.trades.len(),
        win_rate = summary.win_rate,
        total_pnl_pct = summary.total_pnl_pct,
        "scenario complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn five_minute(closes: &[f64], day: u32) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 3, day).unwrap().and_hms_opt(9, 15, 0).unwrap();
        let mut prev = closes[0];
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = prev;
                prev = close;
                Bar {
                    symbol: "ICICIBANK".into(),
                    timestamp: start + Duration::minutes(5 * i as i64),
                    open,
                    high: open.max(close) + 0.5,
                    low: open.min(close) - 0.5,
                    close,
                    volume: 1_000,
                }
            })
            .collect()
    }

    /// 16 warmup closes alternating around 100, ending on 100.0 at index 15.
    fn warmup() -> Vec<f64> {
        (0..16).map(|i| if i % 2 == 0 { 100.1 } else { 100.0 }).collect()
    }

    /// Base-timeframe RSI so the entry bar is index 15; any RSI triggers.
    fn params(action: Direction) -> ScenarioParams {
        ScenarioParams {
            primary: Timeframe::M5,
            action,
            rsi_min: 0.0,
            rsi_max: 100.0,
            ..ScenarioParams::default()
        }
    }

    fn run(closes: &[f64], params: &ScenarioParams) -> Vec<ScenarioTrade> {
        simulate(&five_minute(closes, 11), params)
    }

    // ------------------------------------------------------------------
    // Entry and exits
    // ------------------------------------------------------------------

    #[test]
    fn stop_loss_exit() {
        let mut closes = warmup();
        closes.push(99.0);
        let trades = run(&closes, &params(Direction::Buy));
        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert_eq!(t.exit_trigger, ExitTrigger::StopLoss);
        assert_eq!(t.tranches, 1);
        assert_eq!(t.avg_entry, 100.0);
        assert!((t.pnl_pct - -1.0).abs() < 1e-9);
        assert_eq!(t.action_label(), "BUY (Long)");
    }

    #[test]
    fn target_exit() {
        let mut closes = warmup();
        closes.push(101.0);
        let trades = run(&closes, &params(Direction::Buy));
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_trigger, ExitTrigger::Target);
        assert!((trades[0].pnl_pct - 1.0).abs() < 1e-9);
    }

    #[test]
    fn short_target_is_below_entry() {
        let mut closes = warmup();
        closes.push(99.0);
        let trades = run(&closes, &params(Direction::Sell));
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_trigger, ExitTrigger::Target);
        assert!((trades[0].pnl_pct - 1.0).abs() < 1e-9);
        assert_eq!(trades[0].action_label(), "SELL (Short)");
    }

    #[test]
    fn short_stop_is_above_entry() {
        let mut closes = warmup();
        closes.push(100.5);
        let trades = run(&closes, &params(Direction::Sell));
        assert_eq!(trades[0].exit_trigger, ExitTrigger::StopLoss);
        assert!(trades[0].pnl_pct < 0.0);
    }

    #[test]
    fn scale_in_reweights_average() {
        let mut closes = warmup();
        closes.extend([99.85, 99.745, 100.5]);
        let trades = run(&closes, &params(Direction::Buy));
        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert_eq!(t.tranches, 3);
        let expected_avg = 0.5 * 100.0 + 0.25 * 99.85 + 0.25 * 99.745;
        assert!((t.avg_entry - expected_avg).abs() < 1e-9);
        assert_eq!(t.exit_trigger, ExitTrigger::Target);
        assert!(t.pnl_pct > 0.0);
    }

    #[test]
    fn second_tranche_average() {
        let mut closes = warmup();
        closes.push(99.85);
        let bars = five_minute(&closes, 11);
        let rsi = primary_rsi_on_base(&bars, &params(Direction::Buy));
        assert!(rsi[15].is_finite());
        let pos = Position { entered_at: bars[15].timestamp, fills: vec![100.0, 99.85] };
        assert!((pos.avg_entry() - (0.5 * 100.0 + 0.25 * 99.85) / 0.75).abs() < 1e-12);
    }

    #[test]
    fn supertrend_flip_closes_position() {
        let mut closes = warmup();
        closes.extend((1..=20).map(|k| 100.0 - 0.3 * k as f64));
        let p = ScenarioParams { stop_loss_pct: 5.0, ..params(Direction::Buy) };
        let trades = run(&closes, &p);
        assert!(!trades.is_empty());
        let t = &trades[0];
        assert_eq!(t.exit_trigger, ExitTrigger::SupertrendBreak);
        assert_eq!(t.tranches, 3);
        assert!(t.pnl_pct < 0.0);

        // While the trend stays down, RSI in range re-enters and the next
        // bar's Supertrend check closes it again.
        let mut prev_exit = t.timestamp;
        for re in &trades[1..] {
            assert!(re.entered_at > prev_exit);
            assert_eq!(re.timestamp - re.entered_at, Duration::minutes(5));
            assert_eq!(re.exit_trigger, ExitTrigger::SupertrendBreak);
            assert!(re.pnl_pct <= 0.0);
            prev_exit = re.timestamp;
        }
    }

    #[test]
    fn open_position_not_reported() {
        let mut closes = warmup();
        closes.push(100.05);
        assert!(run(&closes, &params(Direction::Buy)).is_empty());
    }

    // ------------------------------------------------------------------
    // Warmup and windowing
    // ------------------------------------------------------------------

    #[test]
    fn no_entry_before_rsi_warmup() {
        let closes = warmup();
        let bars = five_minute(&closes, 11);
        let rsi = primary_rsi_on_base(&bars, &params(Direction::Buy));
        assert!(rsi[..15].iter().all(|v| v.is_nan()));
        assert!(rsi[15].is_finite());
    }

    #[test]
    fn primary_rsi_waits_for_completed_buckets() {
        let closes: Vec<f64> = (0..70).map(|i| 100.0 + ((i as f64) * 0.9).sin()).collect();
        let bars = five_minute(&closes, 11);
        let p = ScenarioParams { primary: Timeframe::M15, ..params(Direction::Buy) };
        let rsi = primary_rsi_on_base(&bars, &p);
        // 15 primary buckets for RSI(14), then one bucket of shift: base bar 45.
        assert!(rsi[..45].iter().all(|v| v.is_nan()));
        assert!(rsi[45].is_finite());
        // Constant within a bucket.
        assert_eq!(rsi[45], rsi[46]);
        assert_eq!(rsi[46], rsi[47]);

        for t in simulate(&bars, &p) {
            assert!(t.entered_at >= bars[45].timestamp);
        }
    }

    #[test]
    fn start_date_skips_trading_but_keeps_warmup() {
        let mut day_one = five_minute(&warmup(), 11);
        let mut closes = vec![100.0; 2];
        closes.push(101.0);
        day_one.extend(five_minute(&closes, 12));
        let p = ScenarioParams {
            start: NaiveDate::from_ymd_opt(2024, 3, 12),
            ..params(Direction::Buy)
        };
        let trades = simulate(&day_one, &p);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].entered_at.date(), NaiveDate::from_ymd_opt(2024, 3, 12).unwrap());
    }

    // ------------------------------------------------------------------
    // Params and batch runs
    // ------------------------------------------------------------------

    #[test]
    fn params_validation() {
        assert!(ScenarioParams::default().validate().is_ok());
        let bad = ScenarioParams { rsi_min: 40.0, rsi_max: 30.0, ..Default::default() };
        assert!(matches!(bad.validate(), Err(ScenarioError::InvalidParams { field: "rsi", .. })));
        let bad = ScenarioParams { stop_loss_pct: 0.0, ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = ScenarioParams {
            start: NaiveDate::from_ymd_opt(2024, 3, 12),
            end: NaiveDate::from_ymd_opt(2024, 3, 11),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn batch_filters_symbols_and_summarises() {
        let mut win = warmup();
        win.push(101.0);
        let mut loss = warmup();
        loss.push(99.0);

        let mut series = BarSeries::new();
        series.insert("ICICIBANK".into(), five_minute(&win, 11));
        let mut other = five_minute(&loss, 11);
        for b in &mut other {
            b.symbol = "AXISBANK".into();
        }
        series.insert("AXISBANK".into(), other);

        let p = params(Direction::Buy);
        let all = run_scenario(&series, Some("all"), &p).unwrap();
        assert_eq!(all.trades.len(), 2);
        assert_eq!((all.wins, all.losses), (1, 1));
        assert!((all.win_rate - 50.0).abs() < 1e-9);
        assert!(all.total_pnl_pct.abs() < 1e-9);
        // Same exit bar: symbol breaks the tie.
        assert_eq!(all.trades[0].symbol, "AXISBANK");

        let one = run_scenario(&series, Some("icicibank"), &p).unwrap();
        assert_eq!(one.trades.len(), 1);
        assert_eq!(run_scenario(&series, Some("TCS"), &p), Err(ScenarioError::NoSymbols));
    }

    #[test]
    fn empty_summary() {
        let s = ScenarioSummary::from_trades(Vec::new());
        assert_eq!((s.win_rate, s.avg_pnl_pct, s.total_pnl_pct), (0.0, 0.0, 0.0));
    }
}
