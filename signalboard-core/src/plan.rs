//! Trade plan: stop loss and target from the Supertrend band.
//!
//! The Supertrend value is the trailing stop. The target sits
//! `reward_multiple` stop-distances away on the other side of price. When the
//! stop would land on the wrong side of price no plan is produced.

use serde::{Deserialize, Serialize};

use crate::config::PlanConfig;
use crate::domain::Direction;

/// Stop loss and target prices. Both are `None` together when no plan exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub sl: Option<f64>,
    pub target: Option<f64>,
}

impl TradePlan {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_some(&self) -> bool {
        self.sl.is_some() && self.target.is_some()
    }

    /// Signed percentage distance from price to the stop.
    pub fn sl_pct(&self, ltp: f64) -> Option<f64> {
        self.sl.and_then(|sl| pct_from(ltp, sl))
    }

    /// Signed percentage distance from price to the target.
    pub fn target_pct(&self, ltp: f64) -> Option<f64> {
        self.target.and_then(|t| pct_from(ltp, t))
    }

    /// Risk:reward as display text, e.g. `"1.2:2.4"`.
    pub fn rr_ratio(&self, ltp: f64) -> Option<String> {
        let risk = self.sl_pct(ltp)?.abs();
        let reward = self.target_pct(ltp)?.abs();
        Some(format!("{risk:.1}:{reward:.1}"))
    }
}

fn pct_from(ltp: f64, level: f64) -> Option<f64> {
    (ltp.is_finite() && ltp > 0.0).then(|| (level - ltp) / ltp * 100.0)
}

/// Derive a plan from price, trend direction and the Supertrend band.
pub fn plan(
    ltp: f64,
    direction: Option<Direction>,
    supertrend_value: Option<f64>,
    cfg: &PlanConfig,
) -> TradePlan {
    let (Some(direction), Some(sl)) = (direction, supertrend_value) else {
        return TradePlan::none();
    };
    if !ltp.is_finite() || ltp <= 0.0 || !sl.is_finite() {
        return TradePlan::none();
    }

    let risk = match direction {
        Direction::Buy => ltp - sl,
        Direction::Sell => sl - ltp,
    };
    if risk <= 0.0 {
        return TradePlan::none();
    }

    let target = ltp + direction.sign() * risk * cfg.reward_multiple;
    TradePlan { sl: Some(sl), target: Some(target) }
}
