use super::limits::{AccountState, RiskLimitBreach, RiskLimits};
use crate::models::Position;

/// Hard cap on the fraction of balance a single trade may spend
pub const MAX_TRADE_FRACTION: f64 = 0.05;

/// Outcome of sizing a prospective BUY
#[derive(Debug, Clone, PartialEq)]
pub enum SizingDecision {
    Approved { quantity: f64, order_value: f64 },
    LimitExceeded(RiskLimitBreach),
}

/// Converts a decision's confidence into an order quantity, subject to limits
#[derive(Debug, Clone)]
pub struct RiskSizer {
    risk_per_trade: f64,
    limits: RiskLimits,
}

impl RiskSizer {
    pub fn new(risk_per_trade: f64, limits: RiskLimits) -> Self {
        Self {
            risk_per_trade,
            limits,
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Size a BUY at the current price
    ///
    /// order value = balance * min(risk_per_trade * confidence, 5%), so a BUY
    /// can never spend more than 5% of the available balance. Any configured
    /// limit breach downgrades the action instead of erroring.
    pub fn size_buy(&self, state: &AccountState, confidence: f64, price: f64) -> SizingDecision {
        if let Err(breach) = self.limits.check(state) {
            return SizingDecision::LimitExceeded(breach);
        }

        let fraction = (self.risk_per_trade * confidence).min(MAX_TRADE_FRACTION);
        let order_value = state.balance * fraction;

        SizingDecision::Approved {
            quantity: order_value / price,
            order_value,
        }
    }

    /// A SELL always liquidates the full position, never a partial exit
    pub fn size_sell(&self, position: &Position) -> f64 {
        position.quantity
    }
}
