use rust_decimal::Decimal;

use crate::execution::OrderRequest;
use crate::models::{Balances, Side, TradeReason};
use crate::strategy::EngineState;

/// Outcome of checking the profit accumulator
#[derive(Debug, Clone, PartialEq)]
pub enum SweepPlan {
    /// Accumulator below threshold
    Idle,
    /// Threshold reached but the conversion cannot be placed this cycle
    Declined(String),
    Order(OrderRequest),
}

/// Converts realized profit into the reserve asset in fixed-size chunks
#[derive(Debug, Clone)]
pub struct ProfitSweep {
    threshold: Decimal,
    symbol: String,
}

impl ProfitSweep {
    pub fn new(threshold: Decimal, symbol: impl Into<String>) -> Self {
        Self {
            threshold,
            symbol: symbol.into(),
        }
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn is_due(&self, state: &EngineState) -> bool {
        state.realized_profit_accumulator() >= self.threshold
    }

    /// Build the conversion order for exactly one threshold amount, if due
    pub fn plan(&self, state: &EngineState, price: Decimal, balances: &Balances) -> SweepPlan {
        if !self.is_due(state) {
            return SweepPlan::Idle;
        }
        if price <= Decimal::ZERO {
            return SweepPlan::Declined(format!("invalid {} price {}", self.symbol, price));
        }
        if balances.quote_qty < self.threshold {
            return SweepPlan::Declined(format!(
                "insufficient quote balance for sweep: need {}, have {}",
                self.threshold, balances.quote_qty
            ));
        }

        SweepPlan::Order(OrderRequest {
            symbol: self.symbol.clone(),
            side: Side::Buy,
            reason: TradeReason::Sweep,
            quantity: self.threshold / price,
            quote_amount: self.threshold,
            price,
        })
    }

    /// Consume one threshold amount after the conversion was confirmed
    pub fn settle(&self, state: &mut EngineState) {
        state.debit_profit(self.threshold);
    }
}
