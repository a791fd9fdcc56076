use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use super::{EngineState, Signal, Strategy};
use crate::indicators::IndicatorSnapshot;
use crate::models::{Action, TradeReason};

/// Bollinger/RSI band-reversion strategy
///
/// Checks, in priority order:
/// 1. Stop-loss: close below `stop_loss_price * stop_loss_factor` sells
/// 2. Entry: close at or under the lower band while RSI is oversold
/// 3. Exit: close at or over the upper band while RSI is overbought
///
/// With `trend_filter` on, entries also need a rising SMA and exits a falling one.
#[derive(Debug, Clone)]
pub struct BandReversionStrategy {
    config: StrategyConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Fraction of the stop price the close must fall under to exit (e.g. 0.95 = 5% below)
    pub stop_loss_factor: Decimal,

    /// RSI level for an oversold entry (0-100, e.g. 30)
    pub oversold: Decimal,

    /// RSI level for an overbought exit (0-100, e.g. 70)
    pub overbought: Decimal,

    /// Multiplier on the lower band; entries need close <= lower * margin (1.0 = at the band)
    pub entry_margin: Decimal,

    /// Multiplier on the upper band; exits need close >= upper * margin
    pub exit_margin: Decimal,

    /// Require a rising SMA for entries and a falling one for exits
    pub trend_filter: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            stop_loss_factor: dec!(0.95),
            oversold: dec!(30),
            overbought: dec!(70),
            entry_margin: dec!(1.0),
            exit_margin: dec!(1.0),
            trend_filter: false,
        }
    }
}

impl BandReversionStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    fn trend_allows(&self, snapshot: &IndicatorSnapshot, rising: bool) -> bool {
        if !self.config.trend_filter {
            return true;
        }
        match (snapshot.sma, snapshot.sma_prev) {
            (Some(sma), Some(prev)) if rising => sma > prev,
            (Some(sma), Some(prev)) => sma < prev,
            _ => false,
        }
    }
}

impl Default for BandReversionStrategy {
    fn default() -> Self {
        Self::new(StrategyConfig::default())
    }
}

impl Strategy for BandReversionStrategy {
    fn evaluate(&self, snapshot: &IndicatorSnapshot, state: &EngineState) -> Signal {
        // Every lookback must be covered, trend filter or not
        let missing = snapshot.missing_fields(true);
        if !missing.is_empty() {
            return Signal::hold(format!("warming up: {} undefined", missing.join(", ")));
        }

        // Readiness guarantees these
        let (Some(close), Some(rsi), Some(lower), Some(upper)) =
            (snapshot.close, snapshot.rsi, snapshot.bb_lower, snapshot.bb_upper)
        else {
            return Signal::hold("indicators undefined".to_string());
        };

        if let Some(stop) = state.stop_loss_price() {
            let trigger = stop * self.config.stop_loss_factor;
            if close < trigger {
                return Signal {
                    action: Action::Sell,
                    reason: TradeReason::StopLoss,
                    rationale: format!("close {} below stop trigger {}", close, trigger),
                };
            }
        }

        if close <= lower * self.config.entry_margin
            && rsi < self.config.oversold
            && self.trend_allows(snapshot, true)
        {
            return Signal {
                action: Action::Buy,
                reason: TradeReason::Signal,
                rationale: format!("close {} at lower band {} with RSI {:.2}", close, lower, rsi),
            };
        }

        if close >= upper * self.config.exit_margin
            && rsi > self.config.overbought
            && self.trend_allows(snapshot, false)
        {
            return Signal {
                action: Action::Sell,
                reason: TradeReason::Signal,
                rationale: format!("close {} at upper band {} with RSI {:.2}", close, upper, rsi),
            };
        }

        Signal::hold(format!("no setup (close {}, RSI {:.2})", close, rsi))
    }

    fn name(&self) -> &str {
        "Band Reversion"
    }
}
