// Technical indicators module
// Implements RSI, MACD, Bollinger Bands, EMA, SMA over close-price history

pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod rsi;

pub use bollinger::calculate_bollinger;
pub use macd::calculate_macd;
pub use moving_average::{calculate_ema, calculate_sma, ema_series};
pub use rsi::calculate_rsi;

use crate::models::IndicatorSet;

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_WIDTH: f64 = 2.0;
pub const EMA_PERIOD: usize = 20;
pub const SMA_PERIOD: usize = 50;

/// Compute the latest value of every indicator family over one close history
///
/// Each family that lacks its minimum lookback (RSI 15, MACD 35, Bollinger 20,
/// EMA20 20, SMA50 50 closes) comes back absent rather than erroring.
pub fn compute_indicators(closes: &[f64]) -> IndicatorSet {
    IndicatorSet {
        rsi: calculate_rsi(closes, RSI_PERIOD),
        macd: calculate_macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL),
        bollinger: calculate_bollinger(closes, BOLLINGER_PERIOD, BOLLINGER_WIDTH),
        ema20: calculate_ema(closes, EMA_PERIOD),
        sma50: calculate_sma(closes, SMA_PERIOD),
    }
}
