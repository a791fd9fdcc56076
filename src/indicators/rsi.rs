use rust_decimal::Decimal;

/// Calculate Relative Strength Index (RSI) with Wilder smoothing
///
/// The first average gain/loss is the simple mean of the first `period`
/// changes; every later change is folded in as
/// `avg = (avg * (period - 1) + change) / period`.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
pub fn calculate_rsi(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let n = Decimal::from(period);
    let n_minus_one = Decimal::from(period - 1);

    let changes: Vec<Decimal> = prices.windows(2).map(|w| w[1] - w[0]).collect();

    let (seed, rest) = changes.split_at(period);
    let mut avg_gain = seed.iter().filter(|c| c.is_sign_positive()).sum::<Decimal>() / n;
    let mut avg_loss = seed
        .iter()
        .filter(|c| c.is_sign_negative())
        .map(|c| c.abs())
        .sum::<Decimal>()
        / n;

    for change in rest {
        let (gain, loss) = if *change > Decimal::ZERO {
            (*change, Decimal::ZERO)
        } else {
            (Decimal::ZERO, change.abs())
        };
        avg_gain = (avg_gain * n_minus_one + gain) / n;
        avg_loss = (avg_loss * n_minus_one + loss) / n;
    }

    if avg_loss.is_zero() {
        // Flat series carries no momentum either way
        if avg_gain.is_zero() {
            return Some(Decimal::from(50));
        }
        return Some(Decimal::ONE_HUNDRED);
    }

    let rs = avg_gain / avg_loss;
    let rsi = Decimal::ONE_HUNDRED - (Decimal::ONE_HUNDRED / (Decimal::ONE + rs));

    Some(rsi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn to_decimals(values: &[i64]) -> Vec<Decimal> {
        values.iter().map(|v| Decimal::from(*v)).collect()
    }

    #[test]
    fn test_rsi_calculation() {
        let prices = vec![
            dec!(44.0), dec!(44.25), dec!(44.5), dec!(43.75), dec!(44.0), dec!(44.5),
            dec!(45.0), dec!(45.5), dec!(45.25), dec!(45.5), dec!(46.0), dec!(46.5),
            dec!(46.25), dec!(46.0), dec!(46.5),
        ];

        let rsi = calculate_rsi(&prices, 14).unwrap();
        assert!(rsi > Decimal::ZERO && rsi < Decimal::ONE_HUNDRED);
        // Gains 4.0, losses 1.5 over the 14 changes => RS = 8/3 => RSI ~ 72.73
        assert!(rsi > dec!(72.72) && rsi < dec!(72.73));
    }

    #[test]
    fn test_rsi_wilder_smoothing_after_seed() {
        // Seed: alternating +1/-1 over 4 changes => avg gain = avg loss = 0.5
        // Next change +2: gain = (0.5*3 + 2)/4 = 0.875, loss = (0.5*3)/4 = 0.375
        let prices = to_decimals(&[10, 11, 10, 11, 10, 12]);
        let rsi = calculate_rsi(&prices, 4).unwrap();
        let expected = Decimal::ONE_HUNDRED
            - Decimal::ONE_HUNDRED / (Decimal::ONE + dec!(0.875) / dec!(0.375));
        assert_eq!(rsi, expected);
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let prices = to_decimals(&[100, 102, 101]);
        assert!(calculate_rsi(&prices, 14).is_none());
    }

    #[test]
    fn test_rsi_all_gains() {
        let prices = to_decimals(&[100, 101, 102, 103, 104, 105]);
        assert_eq!(calculate_rsi(&prices, 5), Some(Decimal::ONE_HUNDRED));
    }

    #[test]
    fn test_rsi_all_losses_is_zero() {
        let prices = to_decimals(&[105, 104, 103, 102, 101, 100]);
        assert_eq!(calculate_rsi(&prices, 5), Some(Decimal::ZERO));
    }

    #[test]
    fn test_rsi_flat_is_neutral() {
        let prices = vec![dec!(100); 20];
        assert_eq!(calculate_rsi(&prices, 14), Some(dec!(50)));
    }
}
