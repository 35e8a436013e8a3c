use super::moving_average::ema_series;
use crate::models::MacdValue;

/// Calculate Moving Average Convergence Divergence (MACD)
///
/// MACD line = EMA(fast) - EMA(slow); signal line = EMA of the MACD line over
/// `signal_period`; histogram = line - signal. Requires at least
/// `slow + signal_period` closes so the signal line has a value.
pub fn calculate_macd(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Option<MacdValue> {
    if fast >= slow || prices.len() < slow + signal_period {
        return None;
    }

    let fast_series = ema_series(prices, fast)?;
    let slow_series = ema_series(prices, slow)?;

    // Both series end at the last price; align the fast series to the
    // slow series' start before differencing
    let offset = slow - fast;
    let macd_line: Vec<f64> = fast_series[offset..]
        .iter()
        .zip(slow_series.iter())
        .map(|(f, s)| f - s)
        .collect();

    let signal_series = ema_series(&macd_line, signal_period)?;

    let line = *macd_line.last()?;
    let signal = *signal_series.last()?;
    let histogram = line - signal;

    if !(line.is_finite() && signal.is_finite() && histogram.is_finite()) {
        return None;
    }

    Some(MacdValue {
        line,
        signal,
        histogram,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macd_insufficient_data() {
        let prices: Vec<f64> = (0..34).map(|i| 100.0 + i as f64).collect();
        assert!(calculate_macd(&prices, 12, 26, 9).is_none());
    }

    #[test]
    fn test_macd_exact_minimum() {
        let prices: Vec<f64> = (0..35).map(|i| 100.0 + i as f64).collect();
        assert!(calculate_macd(&prices, 12, 26, 9).is_some());
    }

    #[test]
    fn test_macd_uptrend_is_bullish() {
        // Steady uptrend: fast EMA sits above slow EMA, so the line is positive
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
        let macd = calculate_macd(&prices, 12, 26, 9).unwrap();

        assert!(macd.line > 0.0);
        assert!(macd.line > macd.signal || macd.histogram.abs() < 1e-9);
    }

    #[test]
    fn test_macd_downtrend_is_bearish() {
        let prices: Vec<f64> = (0..60).map(|i| 200.0 - i as f64 * 0.5).collect();
        let macd = calculate_macd(&prices, 12, 26, 9).unwrap();

        assert!(macd.line < 0.0);
    }

    #[test]
    fn test_macd_histogram_identity() {
        let prices: Vec<f64> = (0..50)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0)
            .collect();
        let macd = calculate_macd(&prices, 12, 26, 9).unwrap();

        assert!((macd.histogram - (macd.line - macd.signal)).abs() < 1e-12);
    }

    #[test]
    fn test_macd_flat_series_is_zero() {
        let prices = vec![100.0; 40];
        let macd = calculate_macd(&prices, 12, 26, 9).unwrap();

        assert!(macd.line.abs() < 1e-12);
        assert!(macd.signal.abs() < 1e-12);
        assert!(macd.histogram.abs() < 1e-12);
    }
}
