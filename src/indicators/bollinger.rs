use super::moving_average::calculate_sma;
use crate::models::BollingerBands;

/// Calculate Bollinger Bands over the most recent window
///
/// Middle band is the SMA over `period`; upper/lower bands sit `width`
/// population standard deviations above/below it.
pub fn calculate_bollinger(prices: &[f64], period: usize, width: f64) -> Option<BollingerBands> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let middle = calculate_sma(prices, period)?;

    let window = &prices[prices.len() - period..];
    let variance =
        window.iter().map(|p| (p - middle).powi(2)).sum::<f64>() / period as f64;
    let stddev = variance.sqrt();

    let upper = middle + width * stddev;
    let lower = middle - width * stddev;

    if !(upper.is_finite() && lower.is_finite()) {
        return None;
    }

    Some(BollingerBands {
        upper,
        middle,
        lower,
    })
}
