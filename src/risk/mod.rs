// Risk management module
pub mod limits;
pub mod sizer;

pub use limits::{AccountState, RiskLimitBreach, RiskLimits};
pub use sizer::{RiskSizer, SizingDecision, MAX_TRADE_FRACTION};
