//! Trade strategy classification.
//!
//! Each snapshot gets exactly one label. The rules live in an ordered table
//! and the first matching rule wins, so a snapshot that is both a perfect
//! setup and stretched is reported as a perfect setup.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{ReferenceAverage, TradingConfig};
use crate::domain::{Direction, IndicatorSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStrategy {
    PerfectBuy,
    DmaBounce,
    Overextended,
    Normal,
}

impl TradeStrategy {
    pub const ALL: [TradeStrategy; 4] = [
        TradeStrategy::PerfectBuy,
        TradeStrategy::DmaBounce,
        TradeStrategy::Overextended,
        TradeStrategy::Normal,
    ];

    /// Wire code, e.g. "PERFECT_BUY".
    pub fn code(self) -> &'static str {
        match self {
            TradeStrategy::PerfectBuy => "PERFECT_BUY",
            TradeStrategy::DmaBounce => "DMA_BOUNCE",
            TradeStrategy::Overextended => "OVEREXTENDED",
            TradeStrategy::Normal => "NORMAL",
        }
    }

    /// Human-facing badge text.
    pub fn label(self) -> &'static str {
        match self {
            TradeStrategy::PerfectBuy => "Perfect Setup",
            TradeStrategy::DmaBounce => "Support Bounce",
            TradeStrategy::Overextended => "Stretched",
            TradeStrategy::Normal => "Neutral",
        }
    }
}

impl fmt::Display for TradeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub snapshot: &'a IndicatorSnapshot,
    pub rank: u8,
    pub config: &'a TradingConfig,
}

impl RuleContext<'_> {
    fn direction(&self) -> Option<Direction> {
        self.snapshot.supertrend_dir
    }

    fn high_rank(&self) -> u8 {
        self.config.strategy.high_confluence_rank
    }
}

/// One row of the classification table.
pub struct StrategyRule {
    pub strategy: TradeStrategy,
    predicate: fn(&RuleContext<'_>) -> bool,
}

impl StrategyRule {
    pub fn matches(&self, ctx: &RuleContext<'_>) -> bool {
        (self.predicate)(ctx)
    }
}

impl fmt::Debug for StrategyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRule").field("strategy", &self.strategy).finish()
    }
}

/// Classification rules in precedence order. NORMAL is the fallback and has
/// no row.
pub static STRATEGY_RULES: [StrategyRule; 3] = [
    StrategyRule { strategy: TradeStrategy::PerfectBuy, predicate: is_perfect_buy },
    StrategyRule { strategy: TradeStrategy::DmaBounce, predicate: is_dma_bounce },
    StrategyRule { strategy: TradeStrategy::Overextended, predicate: is_overextended },
];

fn is_perfect_buy(ctx: &RuleContext<'_>) -> bool {
    ctx.direction() == Some(Direction::Buy) && ctx.rank >= ctx.high_rank()
}

fn is_dma_bounce(ctx: &RuleContext<'_>) -> bool {
    if ctx.direction() != Some(Direction::Buy) || ctx.rank == 0 || ctx.rank >= ctx.high_rank() {
        return false;
    }
    let ltp = ctx.snapshot.ltp;
    let thresholds = &ctx.config.strategy;

    // Nearest long-period average sitting at or below price.
    let support = ctx
        .config
        .active_dma_periods()
        .iter()
        .filter(|&&p| p >= thresholds.bounce_min_period)
        .filter_map(|&p| ctx.snapshot.dma(p))
        .filter(|&ma| ma > 0.0 && ma <= ltp)
        .max_by(f64::total_cmp);

    match support {
        Some(ma) => (ltp - ma) / ma * 100.0 <= thresholds.bounce_band_pct,
        None => false,
    }
}

// Either trend direction qualifies; a snapshot with no trend yet does not.
fn is_overextended(ctx: &RuleContext<'_>) -> bool {
    let (Some(rsi), Some(_)) = (ctx.snapshot.rsi, ctx.direction()) else {
        return false;
    };
    if rsi <= ctx.config.rsi.overbought {
        return false;
    }
    let reference = match ctx.config.strategy.overextension_reference {
        ReferenceAverage::EmaSlow => ctx.snapshot.ema_slow,
        ReferenceAverage::Dma(period) => ctx.snapshot.dma(period),
    };
    match reference {
        Some(r) if r > 0.0 => {
            (ctx.snapshot.ltp - r).abs() / r * 100.0 > ctx.config.strategy.overextension_pct
        }
        _ => false,
    }
}

/// Label a snapshot given its confluence rank.
pub fn classify(snapshot: &IndicatorSnapshot, rank: u8, config: &TradingConfig) -> TradeStrategy {
    let ctx = RuleContext { snapshot, rank, config };
    STRATEGY_RULES
        .iter()
        .find(|rule| rule.matches(&ctx))
        .map_or(TradeStrategy::Normal, |rule| rule.strategy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(strategy: TradeStrategy) -> &'static StrategyRule {
        STRATEGY_RULES.iter().find(|r| r.strategy == strategy).unwrap()
    }

    fn snap(ltp: f64, dir: Option<Direction>) -> IndicatorSnapshot {
        let mut s = IndicatorSnapshot::new("HDFCBANK", "INE040A01034", ltp);
        s.supertrend_dir = dir;
        s
    }

    // -----------------------------------------------------------------------
    // Precedence
    // -----------------------------------------------------------------------

    #[test]
    fn rules_are_ordered() {
        let order: Vec<_> = STRATEGY_RULES.iter().map(|r| r.strategy).collect();
        assert_eq!(
            order,
            vec![TradeStrategy::PerfectBuy, TradeStrategy::DmaBounce, TradeStrategy::Overextended]
        );
    }

    #[test]
    fn perfect_buy_beats_overextended() {
        let cfg = TradingConfig::swing();
        let mut s = snap(130.0, Some(Direction::Buy));
        s.rsi = Some(85.0);
        s.ema_slow = Some(100.0);
        let ctx = RuleContext { snapshot: &s, rank: 4, config: &cfg };
        assert!(rule(TradeStrategy::Overextended).matches(&ctx));
        assert_eq!(classify(&s, 4, &cfg), TradeStrategy::PerfectBuy);
    }

    #[test]
    fn no_rule_matches_is_normal() {
        let cfg = TradingConfig::swing();
        assert_eq!(classify(&snap(100.0, None), 0, &cfg), TradeStrategy::Normal);
    }

    // -----------------------------------------------------------------------
    // PERFECT_BUY
    // -----------------------------------------------------------------------

    #[test]
    fn perfect_buy_needs_buy_direction_and_high_rank() {
        let cfg = TradingConfig::swing();
        assert_eq!(classify(&snap(100.0, Some(Direction::Buy)), 3, &cfg), TradeStrategy::PerfectBuy);
        assert_eq!(classify(&snap(100.0, Some(Direction::Sell)), 5, &cfg), TradeStrategy::Normal);
        assert_eq!(classify(&snap(100.0, Some(Direction::Buy)), 2, &cfg), TradeStrategy::Normal);
    }

    #[test]
    fn high_confluence_threshold_is_configurable() {
        let mut cfg = TradingConfig::swing();
        cfg.strategy.high_confluence_rank = 4;
        assert_eq!(classify(&snap(100.0, Some(Direction::Buy)), 3, &cfg), TradeStrategy::Normal);
    }

    // -----------------------------------------------------------------------
    // DMA_BOUNCE
    // -----------------------------------------------------------------------

    #[test]
    fn bounce_just_above_support() {
        let cfg = TradingConfig::swing();
        let mut s = snap(101.0, Some(Direction::Buy));
        s.dma_values.insert(50, 100.0);
        s.dma_values.insert(200, 90.0);
        assert_eq!(classify(&s, 2, &cfg), TradeStrategy::DmaBounce);
    }

    #[test]
    fn bounce_ignores_short_periods_and_averages_above_price() {
        let cfg = TradingConfig::swing();
        let mut s = snap(101.0, Some(Direction::Buy));
        // 10-day is below the long-period cut-off.
        s.dma_values.insert(10, 100.5);
        // 50-day sits above price: resistance, not support.
        s.dma_values.insert(50, 102.0);
        s.dma_values.insert(200, 95.0);
        assert_eq!(classify(&s, 1, &cfg), TradeStrategy::Normal);
    }

    #[test]
    fn bounce_band_edges() {
        let cfg = TradingConfig::swing();
        let mut s = snap(101.4, Some(Direction::Buy));
        s.dma_values.insert(20, 100.0);
        assert_eq!(classify(&s, 1, &cfg), TradeStrategy::DmaBounce);
        s.ltp = 101.6;
        assert_eq!(classify(&s, 1, &cfg), TradeStrategy::Normal);
        s.ltp = 100.0;
        assert_eq!(classify(&s, 1, &cfg), TradeStrategy::DmaBounce);
    }

    #[test]
    fn bounce_requires_moderate_rank() {
        let cfg = TradingConfig::swing();
        let mut s = snap(100.5, Some(Direction::Buy));
        s.dma_values.insert(20, 100.0);
        let ctx = RuleContext { snapshot: &s, rank: 0, config: &cfg };
        assert!(!rule(TradeStrategy::DmaBounce).matches(&ctx));
        let ctx = RuleContext { snapshot: &s, rank: 3, config: &cfg };
        assert!(!rule(TradeStrategy::DmaBounce).matches(&ctx));
    }

    #[test]
    fn bounce_requires_enabled_dma_module() {
        let cfg = TradingConfig::intraday();
        let mut s = snap(100.5, Some(Direction::Buy));
        s.dma_values.insert(20, 100.0);
        assert_eq!(classify(&s, 1, &cfg), TradeStrategy::Normal);
    }

    // -----------------------------------------------------------------------
    // OVEREXTENDED
    // -----------------------------------------------------------------------

    #[test]
    fn overextended_regardless_of_direction() {
        let cfg = TradingConfig::swing();
        for dir in [Direction::Sell, Direction::Buy] {
            let mut s = snap(113.0, Some(dir));
            s.rsi = Some(78.0);
            s.ema_slow = Some(100.0);
            assert_eq!(classify(&s, 1, &cfg), TradeStrategy::Overextended);
        }
    }

    #[test]
    fn unknown_trend_is_never_stretched() {
        let cfg = TradingConfig::swing();
        let mut s = snap(113.0, None);
        s.rsi = Some(78.0);
        s.ema_slow = Some(100.0);
        assert_eq!(classify(&s, 0, &cfg), TradeStrategy::Normal);
    }

    #[test]
    fn overextended_needs_both_conditions() {
        let cfg = TradingConfig::swing();
        let mut s = snap(113.0, Some(Direction::Sell));
        s.rsi = Some(65.0);
        s.ema_slow = Some(100.0);
        assert_eq!(classify(&s, 0, &cfg), TradeStrategy::Normal);
        s.rsi = Some(78.0);
        s.ltp = 110.0;
        assert_eq!(classify(&s, 0, &cfg), TradeStrategy::Normal);
        s.ltp = 113.0;
        s.ema_slow = None;
        assert_eq!(classify(&s, 0, &cfg), TradeStrategy::Normal);
    }

    #[test]
    fn overextension_against_dma_reference() {
        let mut cfg = TradingConfig::swing();
        cfg.strategy.overextension_reference = ReferenceAverage::Dma(50);
        let mut s = snap(120.0, Some(Direction::Sell));
        s.rsi = Some(75.0);
        s.ema_slow = Some(119.0);
        s.dma_values.insert(50, 100.0);
        assert_eq!(classify(&s, 0, &cfg), TradeStrategy::Overextended);
    }

    #[test]
    fn codes_and_labels() {
        assert_eq!(TradeStrategy::DmaBounce.code(), "DMA_BOUNCE");
        assert_eq!(TradeStrategy::Overextended.label(), "Stretched");
        assert_eq!(serde_json::to_string(&TradeStrategy::PerfectBuy).unwrap(), "\"PERFECT_BUY\"");
    }
}
