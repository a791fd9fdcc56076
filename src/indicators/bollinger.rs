use rust_decimal::{Decimal, MathematicalOps};

use super::moving_average::calculate_sma;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub lower: Decimal,
    pub middle: Decimal,
    pub upper: Decimal,
}

/// Population standard deviation of the last `period` values
pub fn calculate_stddev(prices: &[Decimal], period: usize) -> Option<Decimal> {
    let mean = calculate_sma(prices, period)?;

    let variance = prices
        .iter()
        .rev()
        .take(period)
        .map(|p| (*p - mean) * (*p - mean))
        .sum::<Decimal>()
        / Decimal::from(period);

    variance.sqrt()
}

/// Bollinger Bands: SMA(period) +/- multiplier * stddev(period)
pub fn calculate_bollinger(
    prices: &[Decimal],
    period: usize,
    multiplier: Decimal,
) -> Option<BollingerBands> {
    let middle = calculate_sma(prices, period)?;
    let width = calculate_stddev(prices, period)? * multiplier;

    Some(BollingerBands {
        lower: middle - width,
        middle,
        upper: middle + width,
    })
}
