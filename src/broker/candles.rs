use std::collections::VecDeque;

use crate::models::Candle;

/// Bounded rolling window of candles for one symbol
///
/// Append-only within a session; the oldest candle falls off once the
/// window is full.
#[derive(Debug, Clone)]
pub struct CandleWindow {
    candles: VecDeque<Candle>,
    max_candles: usize,
}

impl CandleWindow {
    pub fn new(max_candles: usize) -> Self {
        Self {
            candles: VecDeque::with_capacity(max_candles),
            max_candles,
        }
    }

    pub fn push(&mut self, candle: Candle) {
        self.candles.push_back(candle);

        while self.candles.len() > self.max_candles {
            self.candles.pop_front();
        }
    }

    /// Owned copy of the window, oldest first
    pub fn snapshot(&self) -> Vec<Candle> {
        self.candles.iter().cloned().collect()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(close: f64) -> Candle {
        Candle {
            symbol: "AAPL".to_string(),
            timestamp: Utc::now(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_window_keeps_insertion_order() {
        let mut window = CandleWindow::new(10);
        for i in 0..3 {
            window.push(candle(100.0 + i as f64));
        }

        let closes: Vec<f64> = window.snapshot().iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![100.0, 101.0, 102.0]);
        assert_eq!(window.last().unwrap().close, 102.0);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut window = CandleWindow::new(5);
        for i in 0..12 {
            window.push(candle(i as f64));
        }

        assert_eq!(window.len(), 5);
        // Oldest candles dropped first
        assert_eq!(window.snapshot()[0].close, 7.0);
    }

    #[test]
    fn test_empty_window() {
        let window = CandleWindow::new(5);
        assert!(window.is_empty());
        assert!(window.last().is_none());
        assert!(window.snapshot().is_empty());
    }
}
