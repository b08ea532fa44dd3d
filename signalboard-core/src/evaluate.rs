//! Per-snapshot evaluation: confluence score, strategy label and trade plan.
//!
//! Evaluation is pure. Each snapshot is independent of every other, and a
//! malformed snapshot only affects its own row.

use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::config::TradingConfig;
use crate::confluence::{ConfluenceScore, ConfluenceScorer};
use crate::domain::IndicatorSnapshot;
use crate::plan::{plan, TradePlan};
use crate::strategy::{classify, TradeStrategy};

/// Everything derived from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub score: ConfluenceScore,
    pub strategy: TradeStrategy,
    pub plan: TradePlan,
}

impl Evaluation {
    /// Evaluation used for snapshots that fail validation.
    pub fn neutral() -> Self {
        Self {
            score: ConfluenceScore::neutral(),
            strategy: TradeStrategy::Normal,
            plan: TradePlan::none(),
        }
    }
}

/// A snapshot decorated with its derived fields.
///
/// The evaluation is the only copy of the derived values; the row's
/// `confluence_rank`, `trade_strategy`, `sl` and `target` are read from it.
/// Serializes flat, in the backend's row shape: every snapshot field plus
/// those four.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSnapshot {
    pub snapshot: IndicatorSnapshot,
    evaluation: Evaluation,
}

impl RankedSnapshot {
    pub fn new(snapshot: IndicatorSnapshot, evaluation: Evaluation) -> Self {
        Self { snapshot, evaluation }
    }

    pub fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    pub fn confluence_rank(&self) -> u8 {
        self.evaluation.score.rank
    }

    pub fn trade_strategy(&self) -> TradeStrategy {
        self.evaluation.strategy
    }

    pub fn sl(&self) -> Option<f64> {
        self.evaluation.plan.sl
    }

    pub fn target(&self) -> Option<f64> {
        self.evaluation.plan.target
    }

    pub fn plan(&self) -> &TradePlan {
        &self.evaluation.plan
    }

    pub fn rr_ratio(&self) -> Option<String> {
        self.evaluation.plan.rr_ratio(self.snapshot.ltp)
    }
}

#[derive(Serialize)]
struct RowRef<'a> {
    #[serde(flatten)]
    snapshot: &'a IndicatorSnapshot,
    confluence_rank: u8,
    trade_strategy: TradeStrategy,
    sl: Option<f64>,
    target: Option<f64>,
}

impl Serialize for RankedSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RowRef {
            snapshot: &self.snapshot,
            confluence_rank: self.confluence_rank(),
            trade_strategy: self.trade_strategy(),
            sl: self.sl(),
            target: self.target(),
        }
        .serialize(serializer)
    }
}

fn evaluate_with(
    scorer: &ConfluenceScorer,
    snapshot: &IndicatorSnapshot,
    cfg: &TradingConfig,
) -> Evaluation {
    let score = scorer.score(snapshot);
    let strategy = classify(snapshot, score.rank, cfg);
    let plan = plan(snapshot.ltp, score.direction, snapshot.supertrend_value, &cfg.plan);
    debug!(
        symbol = %snapshot.symbol,
        rank = score.rank,
        available = score.available,
        strategy = %strategy,
        "evaluated snapshot"
    );
    Evaluation { score, strategy, plan }
}

/// Score, classify and plan a single snapshot.
pub fn evaluate(snapshot: &IndicatorSnapshot, cfg: &TradingConfig) -> Evaluation {
    evaluate_with(&ConfluenceScorer::from_config(cfg), snapshot, cfg)
}

pub fn rank_snapshot(snapshot: IndicatorSnapshot, cfg: &TradingConfig) -> RankedSnapshot {
    let evaluation = evaluate(&snapshot, cfg);
    RankedSnapshot::new(snapshot, evaluation)
}

/// Evaluate a whole board.
///
/// Snapshots that fail validation are logged and given the neutral
/// evaluation; the rest of the board is unaffected. Output order matches
/// input order.
pub fn rank_board<I>(snapshots: I, cfg: &TradingConfig) -> Vec<RankedSnapshot>
where
    I: IntoIterator<Item = IndicatorSnapshot>,
{
    let scorer = ConfluenceScorer::from_config(cfg);
    let mut rejected = 0usize;
    let ranked: Vec<RankedSnapshot> = snapshots
        .into_iter()
        .map(|snapshot| {
            let evaluation = match snapshot.validate() {
                Ok(()) => evaluate_with(&scorer, &snapshot, cfg),
                Err(e) => {
                    warn!(error = %e, "skipping malformed snapshot");
                    rejected += 1;
                    Evaluation::neutral()
                }
            };
            RankedSnapshot::new(snapshot, evaluation)
        })
        .collect();

    debug!(rows = ranked.len(), rejected, "ranked board");
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, VolumeSignal};

    fn perfect() -> IndicatorSnapshot {
        let mut s = IndicatorSnapshot::new("RELIANCE", "INE002A01018", 105.0);
        s.rsi = Some(75.0);
        s.supertrend_dir = Some(Direction::Buy);
        s.supertrend_value = Some(100.0);
        s.ema_signal = Some(Direction::Buy);
        s.volume_signal = Some(VolumeSignal::BullSpike);
        s.dma_values.insert(20, 100.0);
        s.dma_values.insert(50, 98.0);
        s.candlestick_pattern = Some("Bullish Engulfing".into());
        s
    }

    #[test]
    fn evaluation_combines_all_three() {
        let cfg = TradingConfig::swing();
        let e = evaluate(&perfect(), &cfg);
        assert_eq!(e.score.rank, 5);
        assert_eq!(e.strategy, TradeStrategy::PerfectBuy);
        assert_eq!(e.plan.sl, Some(100.0));
        assert_eq!(e.plan.target, Some(115.0));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let cfg = TradingConfig::swing();
        let snap = perfect();
        assert_eq!(evaluate(&snap, &cfg), evaluate(&snap, &cfg));
    }

    #[test]
    fn no_baseline_means_no_plan() {
        let mut snap = perfect();
        snap.supertrend_dir = None;
        let r = rank_snapshot(snap, &TradingConfig::swing());
        assert_eq!(r.confluence_rank(), 0);
        assert_eq!(r.trade_strategy(), TradeStrategy::Normal);
        assert_eq!(r.sl(), None);
        assert_eq!(r.target(), None);
        assert_eq!(r.rr_ratio(), None);
    }

    #[test]
    fn malformed_snapshot_is_isolated() {
        let mut bad = perfect();
        bad.symbol = "BROKEN".into();
        bad.rsi = Some(250.0);
        let board = rank_board(vec![perfect(), bad, perfect()], &TradingConfig::swing());
        assert_eq!(board.len(), 3);
        assert_eq!(board[0].confluence_rank(), 5);
        assert_eq!(board[1].snapshot.symbol, "BROKEN");
        assert_eq!(board[1].evaluation(), &Evaluation::neutral());
        assert_eq!(board[2].confluence_rank(), 5);
    }

    #[test]
    fn ranked_row_serializes_flat() {
        let r = rank_snapshot(perfect(), &TradingConfig::swing());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["symbol"], "RELIANCE");
        assert_eq!(v["confluence_rank"], 5);
        assert_eq!(v["trade_strategy"], "PERFECT_BUY");
        assert_eq!(v["sl"], 100.0);
        assert!(v.get("evaluation").is_none());
        assert!(v.get("snapshot").is_none());
    }

    #[test]
    fn derived_fields_follow_the_evaluation() {
        let snap = perfect();
        let mut evaluation = evaluate(&snap, &TradingConfig::swing());
        evaluation.score.rank = 2;
        evaluation.plan = TradePlan::none();
        let r = RankedSnapshot::new(snap, evaluation);
        assert_eq!(r.confluence_rank(), 2);
        assert_eq!(r.sl(), None);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["confluence_rank"], 2);
        assert!(v["sl"].is_null());
        assert!(v["target"].is_null());
    }
}
