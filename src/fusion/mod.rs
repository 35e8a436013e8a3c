// Signal fusion module
// Converts indicator values plus an external sentiment score into one
// action decision with a confidence in [0, 1]

use serde::{Deserialize, Serialize};

use crate::models::{
    BollingerBands, FusedSignal, IndicatorSet, MacdValue, SentimentScore, SignalDirection,
    SubSignal, TradeAction,
};

pub const WEIGHT_RSI: f64 = 0.30;
pub const WEIGHT_MACD: f64 = 0.25;
pub const WEIGHT_BOLLINGER: f64 = 0.25;
pub const WEIGHT_TREND: f64 = 0.20;

pub const DECISION_THRESHOLD: f64 = 0.6;

const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;

const SENTIMENT_BULLISH: f64 = 0.6;
const SENTIMENT_BEARISH: f64 = 0.4;
const SENTIMENT_ADJUSTMENT: f64 = 0.1;

/// One sub-signal per indicator family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubSignals {
    pub rsi: SubSignal,
    pub macd: SubSignal,
    pub bollinger: SubSignal,
    pub trend: SubSignal,
}

pub fn analyze_rsi(rsi: Option<f64>) -> SubSignal {
    match rsi {
        None => SubSignal::new(SignalDirection::Hold, 0.0, "No data"),
        Some(value) if value < RSI_OVERSOLD => {
            SubSignal::new(SignalDirection::Buy, 0.8, "Oversold")
        }
        Some(value) if value > RSI_OVERBOUGHT => {
            SubSignal::new(SignalDirection::Sell, 0.8, "Overbought")
        }
        Some(_) => SubSignal::new(SignalDirection::Hold, 0.1, "Neutral"),
    }
}

pub fn analyze_macd(macd: Option<&MacdValue>) -> SubSignal {
    let Some(macd) = macd else {
        return SubSignal::new(SignalDirection::Hold, 0.0, "No data");
    };

    if macd.line > macd.signal && macd.histogram > 0.0 {
        SubSignal::new(SignalDirection::Buy, 0.6, "Bullish crossover")
    } else if macd.line < macd.signal && macd.histogram < 0.0 {
        SubSignal::new(SignalDirection::Sell, 0.6, "Bearish crossover")
    } else {
        SubSignal::new(SignalDirection::Hold, 0.2, "No clear signal")
    }
}

pub fn analyze_bollinger(price: f64, bands: Option<&BollingerBands>) -> SubSignal {
    let Some(bands) = bands else {
        return SubSignal::new(SignalDirection::Hold, 0.0, "No data");
    };

    if price <= bands.lower {
        SubSignal::new(SignalDirection::Buy, 0.7, "Price at lower band")
    } else if price >= bands.upper {
        SubSignal::new(SignalDirection::Sell, 0.7, "Price at upper band")
    } else {
        SubSignal::new(SignalDirection::Hold, 0.3, "Price in middle range")
    }
}

pub fn analyze_trend(ema20: Option<f64>, sma50: Option<f64>, price: f64) -> SubSignal {
    let (Some(ema20), Some(sma50)) = (ema20, sma50) else {
        return SubSignal::new(SignalDirection::Hold, 0.0, "No data");
    };

    if ema20 > sma50 && price > ema20 {
        SubSignal::new(SignalDirection::Buy, 0.5, "Uptrend confirmed")
    } else if ema20 < sma50 && price < ema20 {
        SubSignal::new(SignalDirection::Sell, 0.5, "Downtrend confirmed")
    } else {
        SubSignal::new(SignalDirection::Hold, 0.2, "Trend unclear")
    }
}

/// Derive all four sub-signals from an indicator set at the current price
pub fn analyze(indicators: &IndicatorSet, price: f64) -> SubSignals {
    SubSignals {
        rsi: analyze_rsi(indicators.rsi),
        macd: analyze_macd(indicators.macd.as_ref()),
        bollinger: analyze_bollinger(price, indicators.bollinger.as_ref()),
        trend: analyze_trend(indicators.ema20, indicators.sma50, price),
    }
}

/// Fuse weighted sub-signals and sentiment into one decision
///
/// buy/sell scores are the weighted strengths of the BUY/SELL votes; a
/// sentiment score above 0.6 adds 0.1 to the buy side, below 0.4 adds 0.1 to
/// the sell side. An action fires only when its score clears 0.6 AND beats
/// the opposite score, so equal scores always resolve to HOLD.
pub fn fuse(subs: &SubSignals, sentiment: &SentimentScore) -> FusedSignal {
    let weighted = [
        (&subs.rsi, WEIGHT_RSI),
        (&subs.macd, WEIGHT_MACD),
        (&subs.bollinger, WEIGHT_BOLLINGER),
        (&subs.trend, WEIGHT_TREND),
    ];

    let mut buy_score = 0.0;
    let mut sell_score = 0.0;

    for (signal, weight) in weighted {
        match signal.direction {
            SignalDirection::Buy => buy_score += weight * signal.strength,
            SignalDirection::Sell => sell_score += weight * signal.strength,
            SignalDirection::Hold => {}
        }
    }

    if sentiment.score > SENTIMENT_BULLISH {
        buy_score += SENTIMENT_ADJUSTMENT;
    }
    if sentiment.score < SENTIMENT_BEARISH {
        sell_score += SENTIMENT_ADJUSTMENT;
    }

    if buy_score > DECISION_THRESHOLD && buy_score > sell_score {
        FusedSignal {
            action: TradeAction::Buy,
            confidence: buy_score,
            reason: "Combined bullish signals".to_string(),
        }
    } else if sell_score > DECISION_THRESHOLD && sell_score > buy_score {
        FusedSignal {
            action: TradeAction::Sell,
            confidence: sell_score,
            reason: "Combined bearish signals".to_string(),
        }
    } else {
        FusedSignal {
            action: TradeAction::Hold,
            confidence: buy_score.max(sell_score),
            reason: "No clear signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_buy_subs() -> SubSignals {
        SubSignals {
            rsi: SubSignal::new(SignalDirection::Buy, 0.8, "Oversold"),
            macd: SubSignal::new(SignalDirection::Buy, 0.6, "Bullish crossover"),
            bollinger: SubSignal::new(SignalDirection::Buy, 0.7, "Price at lower band"),
            trend: SubSignal::new(SignalDirection::Buy, 0.5, "Uptrend confirmed"),
        }
    }

    fn sentiment(score: f64) -> SentimentScore {
        SentimentScore {
            score,
            confidence: 1.0,
        }
    }

    #[test]
    fn test_all_bullish_with_flat_sentiment() {
        // 0.3*0.8 + 0.25*0.6 + 0.25*0.7 + 0.2*0.5 = 0.665
        let fused = fuse(&all_buy_subs(), &sentiment(0.5));

        assert_eq!(fused.action, TradeAction::Buy);
        assert!((fused.confidence - 0.665).abs() < 1e-9);
    }

    #[test]
    fn test_bullish_sentiment_boosts_buy_score() {
        let fused = fuse(&all_buy_subs(), &sentiment(0.7));

        assert_eq!(fused.action, TradeAction::Buy);
        assert!((fused.confidence - 0.765).abs() < 1e-9);
    }

    #[test]
    fn test_neutral_fallback_sentiment_feeds_sell_side() {
        // The neutral fallback score of 0.0 sits below the bearish bound, so
        // it adds 0.1 to the sell score without flipping a strong buy
        let fused = fuse(&all_buy_subs(), &SentimentScore::neutral());

        assert_eq!(fused.action, TradeAction::Buy);
        assert!((fused.confidence - 0.665).abs() < 1e-9);
    }

    #[test]
    fn test_all_absent_indicators_hold_with_zero_strength() {
        let set = IndicatorSet::default();
        let subs = analyze(&set, 100.0);

        for signal in [&subs.rsi, &subs.macd, &subs.bollinger, &subs.trend] {
            assert_eq!(signal.direction, SignalDirection::Hold);
            assert_eq!(signal.strength, 0.0);
        }

        let fused = fuse(&subs, &sentiment(0.5));
        assert_eq!(fused.action, TradeAction::Hold);
        assert_eq!(fused.confidence, 0.0);
    }

    #[test]
    fn test_score_below_threshold_does_not_fire() {
        // rsi 1.0 (0.3) + macd 1.0 (0.25) = 0.55, short of the 0.6 bar
        let subs = SubSignals {
            rsi: SubSignal::new(SignalDirection::Buy, 1.0, "Oversold"),
            macd: SubSignal::new(SignalDirection::Buy, 1.0, "Bullish crossover"),
            bollinger: SubSignal::new(SignalDirection::Hold, 0.3, "Price in middle range"),
            trend: SubSignal::new(SignalDirection::Hold, 0.2, "Trend unclear"),
        };

        let fused = fuse(&subs, &sentiment(0.5));
        assert_eq!(fused.action, TradeAction::Hold);
        assert!((fused.confidence - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_tied_scores_resolve_to_hold() {
        // One buy vote and one sell vote with equal weighted strength
        let subs = SubSignals {
            rsi: SubSignal::new(SignalDirection::Hold, 0.1, "Neutral"),
            macd: SubSignal::new(SignalDirection::Buy, 1.0, "Bullish crossover"),
            bollinger: SubSignal::new(SignalDirection::Sell, 1.0, "Price at upper band"),
            trend: SubSignal::new(SignalDirection::Hold, 0.2, "Trend unclear"),
        };

        let fused = fuse(&subs, &sentiment(0.5));
        assert_eq!(fused.action, TradeAction::Hold);
        assert!((fused.confidence - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_thresholds() {
        assert_eq!(analyze_rsi(Some(25.0)).direction, SignalDirection::Buy);
        assert_eq!(analyze_rsi(Some(75.0)).direction, SignalDirection::Sell);
        assert_eq!(analyze_rsi(Some(50.0)).direction, SignalDirection::Hold);
        assert_eq!(analyze_rsi(Some(50.0)).strength, 0.1);
        // Boundary values are neutral, not signals
        assert_eq!(analyze_rsi(Some(30.0)).direction, SignalDirection::Hold);
        assert_eq!(analyze_rsi(Some(70.0)).direction, SignalDirection::Hold);
    }

    #[test]
    fn test_macd_crossovers() {
        let bullish = MacdValue {
            line: 1.2,
            signal: 0.8,
            histogram: 0.4,
        };
        let bearish = MacdValue {
            line: -1.2,
            signal: -0.8,
            histogram: -0.4,
        };
        // Line above signal but histogram still negative: not a crossover
        let mixed = MacdValue {
            line: 0.5,
            signal: 0.6,
            histogram: 0.1,
        };

        assert_eq!(analyze_macd(Some(&bullish)).direction, SignalDirection::Buy);
        assert_eq!(analyze_macd(Some(&bearish)).direction, SignalDirection::Sell);
        assert_eq!(analyze_macd(Some(&mixed)).direction, SignalDirection::Hold);
        assert_eq!(analyze_macd(Some(&mixed)).strength, 0.2);
    }

    #[test]
    fn test_bollinger_band_touches() {
        let bands = BollingerBands {
            upper: 110.0,
            middle: 100.0,
            lower: 90.0,
        };

        assert_eq!(
            analyze_bollinger(89.0, Some(&bands)).direction,
            SignalDirection::Buy
        );
        assert_eq!(
            analyze_bollinger(90.0, Some(&bands)).direction,
            SignalDirection::Buy
        );
        assert_eq!(
            analyze_bollinger(111.0, Some(&bands)).direction,
            SignalDirection::Sell
        );
        assert_eq!(
            analyze_bollinger(100.0, Some(&bands)).direction,
            SignalDirection::Hold
        );
    }

    #[test]
    fn test_trend_requires_both_averages() {
        assert_eq!(
            analyze_trend(Some(105.0), None, 110.0).direction,
            SignalDirection::Hold
        );
        assert_eq!(analyze_trend(Some(105.0), None, 110.0).strength, 0.0);

        assert_eq!(
            analyze_trend(Some(105.0), Some(100.0), 110.0).direction,
            SignalDirection::Buy
        );
        assert_eq!(
            analyze_trend(Some(95.0), Some(100.0), 90.0).direction,
            SignalDirection::Sell
        );
        // Averages bullish but price below the fast average: unclear
        assert_eq!(
            analyze_trend(Some(105.0), Some(100.0), 102.0).direction,
            SignalDirection::Hold
        );
    }
}
