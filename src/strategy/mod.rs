// Trading strategy module
pub mod band_reversion;
pub mod state;

pub use band_reversion::{BandReversionStrategy, StrategyConfig};
pub use state::EngineState;

use crate::indicators::IndicatorSnapshot;
use crate::models::{Action, TradeReason};

/// Decision for one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub action: Action,
    pub reason: TradeReason,
    pub rationale: String,
}

impl Signal {
    pub fn hold(rationale: String) -> Self {
        Self {
            action: Action::Hold,
            reason: TradeReason::Signal,
            rationale,
        }
    }
}

/// Base trait for trading strategies
///
/// Evaluation is pure: state changes are committed by the caller once the
/// resulting trade is confirmed.
pub trait Strategy: Send + Sync {
    /// Decide Buy/Sell/Hold from the latest snapshot and the current stop
    fn evaluate(&self, snapshot: &IndicatorSnapshot, state: &EngineState) -> Signal;

    /// Get strategy name
    fn name(&self) -> &str;
}
