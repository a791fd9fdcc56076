// Technical indicators module
// Implements RSI, Bollinger Bands, ATR and SMA over a candle window

pub mod atr;
pub mod bollinger;
pub mod moving_average;
pub mod rsi;

pub use atr::calculate_atr;
pub use bollinger::{calculate_bollinger, calculate_stddev, BollingerBands};
pub use moving_average::calculate_sma;
pub use rsi::calculate_rsi;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::Candle;

pub const RSI_PERIOD: usize = 14;
pub const BB_PERIOD: usize = 20;
pub const BB_MULTIPLIER: Decimal = dec!(2.0);
pub const ATR_PERIOD: usize = 14;
pub const SMA_PERIOD: usize = 50;

/// Candles needed before every snapshot field is defined (`sma_prev` needs one extra bar)
pub const LONGEST_LOOKBACK: usize = SMA_PERIOD + 1;

/// Indicator values for the latest bar of a window.
///
/// `None` means the window is shorter than that indicator's lookback.
/// Never read a `None` as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorSnapshot {
    pub open_time: Option<DateTime<Utc>>,
    pub close: Option<Decimal>,
    pub rsi: Option<Decimal>,
    pub bb_lower: Option<Decimal>,
    pub bb_upper: Option<Decimal>,
    pub atr: Option<Decimal>,
    pub sma: Option<Decimal>,
    /// SMA as of the previous bar
    pub sma_prev: Option<Decimal>,
}

impl IndicatorSnapshot {
    /// Names of the fields still undefined; the SMA pair only matters with the trend filter
    pub fn missing_fields(&self, needs_trend: bool) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.close.is_none() {
            missing.push("close");
        }
        if self.rsi.is_none() {
            missing.push("rsi");
        }
        if self.bb_lower.is_none() || self.bb_upper.is_none() {
            missing.push("bollinger");
        }
        if self.atr.is_none() {
            missing.push("atr");
        }
        if needs_trend {
            if self.sma.is_none() {
                missing.push("sma");
            }
            if self.sma_prev.is_none() {
                missing.push("sma_prev");
            }
        }
        missing
    }

    pub fn is_ready(&self, needs_trend: bool) -> bool {
        self.missing_fields(needs_trend).is_empty()
    }
}

/// Compute every indicator for the latest bar; pure function of `candles`
pub fn compute(candles: &[Candle]) -> IndicatorSnapshot {
    let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
    let bands = calculate_bollinger(&closes, BB_PERIOD, BB_MULTIPLIER);

    let sma_prev = if closes.len() > 1 {
        calculate_sma(&closes[..closes.len() - 1], SMA_PERIOD)
    } else {
        None
    };

    let snapshot = IndicatorSnapshot {
        open_time: candles.last().map(|c| c.open_time),
        close: closes.last().copied(),
        rsi: calculate_rsi(&closes, RSI_PERIOD),
        bb_lower: bands.map(|b| b.lower),
        bb_upper: bands.map(|b| b.upper),
        atr: calculate_atr(candles, ATR_PERIOD),
        sma: calculate_sma(&closes, SMA_PERIOD),
        sma_prev,
    };

    tracing::debug!(
        "Indicators: close={:?} rsi={:?} bb=[{:?}, {:?}] atr={:?} sma={:?} sma_prev={:?}",
        snapshot.close,
        snapshot.rsi,
        snapshot.bb_lower,
        snapshot.bb_upper,
        snapshot.atr,
        snapshot.sma,
        snapshot.sma_prev
    );

    snapshot
}
