use serde::{Deserialize, Serialize};

/// Hard limits consulted before any new BUY
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_positions: usize,
    pub max_exposure_pct: f64,
    pub max_drawdown_pct: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_positions: 10,      // Max 10 concurrent positions
            max_exposure_pct: 0.50, // Max 50% of equity deployed
            max_drawdown_pct: 0.20, // -20% from peak equity
        }
    }
}

/// Account view the limit check runs against
#[derive(Debug, Clone)]
pub struct AccountState {
    pub balance: f64,
    pub open_positions: usize,
    /// Market value of all open positions
    pub exposure: f64,
    pub peak_equity: f64,
}

impl AccountState {
    pub fn equity(&self) -> f64 {
        self.balance + self.exposure
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLimitBreach {
    MaxPositions,
    MaxExposure,
    MaxDrawdown,
}

impl RiskLimitBreach {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLimitBreach::MaxPositions => "max concurrent positions reached",
            RiskLimitBreach::MaxExposure => "max exposure reached",
            RiskLimitBreach::MaxDrawdown => "max drawdown exceeded",
        }
    }
}

impl RiskLimits {
    /// Check every limit against the current account state
    ///
    /// A breach is a normal trading condition, not a failure: the caller
    /// downgrades the pending BUY to HOLD.
    pub fn check(&self, state: &AccountState) -> Result<(), RiskLimitBreach> {
        if state.open_positions >= self.max_positions {
            return Err(RiskLimitBreach::MaxPositions);
        }

        let equity = state.equity();

        if equity > 0.0 && state.exposure / equity > self.max_exposure_pct {
            return Err(RiskLimitBreach::MaxExposure);
        }

        if state.peak_equity > 0.0 {
            let drawdown = (state.peak_equity - equity) / state.peak_equity;
            if drawdown > self.max_drawdown_pct {
                return Err(RiskLimitBreach::MaxDrawdown);
            }
        }

        Ok(())
    }
}
