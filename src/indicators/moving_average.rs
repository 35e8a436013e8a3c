/// Calculate Simple Moving Average (SMA) over the most recent window
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    let sma = sum / period as f64;
    sma.is_finite().then_some(sma)
}

/// Calculate the full Exponential Moving Average series
///
/// The first value is the SMA of the first `period` prices; each later value
/// folds in the next price with multiplier `2 / (period + 1)`. The returned
/// series covers price indices `period - 1 ..= len - 1`.
pub fn ema_series(prices: &[f64], period: usize) -> Option<Vec<f64>> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    // Start with SMA
    let mut ema = prices[..period].iter().sum::<f64>() / period as f64;

    let mut series = Vec::with_capacity(prices.len() - period + 1);
    series.push(ema);

    for price in &prices[period..] {
        ema = (price - ema) * multiplier + ema;
        series.push(ema);
    }

    Some(series)
}

/// Calculate Exponential Moving Average (EMA), most recent value only
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    let series = ema_series(prices, period)?;
    let ema = *series.last()?;
    ema.is_finite().then_some(ema)
}
