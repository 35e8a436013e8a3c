use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// OHLCV candlestick data for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Point-in-time view of one symbol's market
///
/// Replaced wholesale on every refresh; the candle history is a bounded
/// window ordered oldest to newest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume: f64,
    pub candles: Vec<Candle>,
    pub last_update: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Closing prices, oldest first
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

/// MACD line, signal line and histogram
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Bollinger band envelope
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Latest value of each indicator family
///
/// A field is `None` when the close history is shorter than that indicator's
/// minimum lookback, or when the math degenerates to a non-finite value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub rsi: Option<f64>,
    pub macd: Option<MacdValue>,
    pub bollinger: Option<BollingerBands>,
    pub ema20: Option<f64>,
    pub sma50: Option<f64>,
}

/// Direction of a single indicator's vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDirection {
    Buy,
    Sell,
    Hold,
}

/// One indicator family's vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubSignal {
    pub direction: SignalDirection,
    pub strength: f64,
    pub reason: String,
}

impl SubSignal {
    pub fn new(direction: SignalDirection, strength: f64, reason: &str) -> Self {
        Self {
            direction,
            strength,
            reason: reason.to_string(),
        }
    }
}

/// Final action after fusing all sub-signals with sentiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Hold => "HOLD",
        }
    }
}

/// Fused decision for one symbol on one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedSignal {
    pub action: TradeAction,
    pub confidence: f64,
    pub reason: String,
}

/// Open position in a symbol
///
/// Exists only while quantity > 0; a full exit removes the position instead
/// of zeroing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub avg_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Filled,
    Rejected,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Filled => "FILLED",
            TradeStatus::Rejected => "REJECTED",
        }
    }
}

/// Order kind accepted by brokers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
}

/// Executed order record, immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub status: TradeStatus,
}

impl Trade {
    /// Build a filled trade stamped with the current time
    pub fn filled(symbol: &str, side: TradeSide, quantity: f64, price: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            timestamp: Utc::now(),
            status: TradeStatus::Filled,
        }
    }
}

/// External sentiment reading for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub score: f64,
    pub confidence: f64,
}

impl SentimentScore {
    /// Neutral reading used whenever sentiment is disabled or unavailable
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            confidence: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_filled() {
        let trade = Trade::filled("AAPL", TradeSide::Buy, 5.0, 182.5);

        assert_eq!(trade.symbol, "AAPL");
        assert_eq!(trade.side, TradeSide::Buy);
        assert_eq!(trade.quantity, 5.0);
        assert_eq!(trade.price, 182.5);
        assert_eq!(trade.status, TradeStatus::Filled);
    }

    #[test]
    fn test_snapshot_closes_preserve_order() {
        let candles: Vec<Candle> = (0..3)
            .map(|i| Candle {
                symbol: "AAPL".to_string(),
                timestamp: Utc::now(),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + i as f64,
                volume: 1000.0,
            })
            .collect();

        let snapshot = MarketSnapshot {
            symbol: "AAPL".to_string(),
            price: 102.0,
            bid: 101.99,
            ask: 102.01,
            volume: 1000.0,
            candles,
            last_update: Utc::now(),
        };

        assert_eq!(snapshot.closes(), vec![100.0, 101.0, 102.0]);
    }

    #[test]
    fn test_trade_survives_serialization_unchanged() {
        let trade = Trade::filled("MSFT", TradeSide::Sell, 3.5, 410.12);

        let json = serde_json::to_string(&trade).unwrap();
        let restored: Trade = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.id, trade.id);
        assert_eq!(restored.symbol, trade.symbol);
        assert_eq!(restored.side, trade.side);
        assert_eq!(restored.quantity, trade.quantity);
        assert_eq!(restored.price, trade.price);
        assert_eq!(restored.status, trade.status);
    }

    #[test]
    fn test_neutral_sentiment() {
        let neutral = SentimentScore::neutral();
        assert_eq!(neutral.score, 0.0);
        assert_eq!(neutral.confidence, 0.0);
    }
}
