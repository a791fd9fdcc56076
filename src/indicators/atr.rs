//! Average True Range (ATR) indicator
//!
//! Measures market volatility by calculating the average of true ranges over a period.
//! True Range is the greatest of:
//! - Current High - Current Low
//! - Abs(Current High - Previous Close)
//! - Abs(Current Low - Previous Close)
//!
//! Uses Wilder's smoothing (same as RSI) for the moving average.
use rust_decimal::Decimal;

use crate::models::Candle;

fn true_ranges(candles: &[Candle]) -> Vec<Decimal> {
    candles
        .windows(2)
        .map(|w| {
            let high = w[1].high;
            let low = w[1].low;
            let prev_close = w[0].close;

            (high - low)
                .max((high - prev_close).abs())
                .max((low - prev_close).abs())
        })
        .collect()
}

/// Calculate ATR for the given candles
///
/// Returns the current ATR value, or None if insufficient data
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<Decimal> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let ranges = true_ranges(candles);
    let n = Decimal::from(period);
    let n_minus_one = Decimal::from(period - 1);

    // First ATR is simple average of first 'period' true ranges
    let mut atr = ranges.iter().take(period).sum::<Decimal>() / n;

    for tr in &ranges[period..] {
        atr = (atr * n_minus_one + tr) / n;
    }

    Some(atr)
}
