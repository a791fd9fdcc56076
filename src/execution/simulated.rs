use async_trait::async_trait;
use chrono::Utc;

use super::gateway::{CostBasis, ExecutionGateway, OrderRequest};
use crate::error::BotError;
use crate::models::{Balances, ExecutionMode, Side, TradeRecord};
use crate::Result;

/// Paper-trading backend: fills every order at its reference price
pub struct SimulatedGateway {
    balances: Balances,
    cost_basis: CostBasis,
}

impl SimulatedGateway {
    pub fn new(balances: Balances) -> Self {
        Self {
            balances,
            cost_basis: CostBasis::default(),
        }
    }

    /// Resume with balances and cost basis carried over from the ledger
    pub fn resume(balances: Balances, cost_basis: CostBasis) -> Self {
        Self {
            balances,
            cost_basis,
        }
    }

    pub fn current_balances(&self) -> Balances {
        self.balances
    }
}

#[async_trait]
impl ExecutionGateway for SimulatedGateway {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Simulated
    }

    async fn balances(&self) -> Result<Balances> {
        Ok(self.balances)
    }

    async fn execute(&mut self, order: &OrderRequest) -> Result<TradeRecord> {
        if order.price <= rust_decimal::Decimal::ZERO {
            return Err(BotError::InvariantViolation(format!(
                "simulated fill at non-positive price {}",
                order.price
            )));
        }

        let (quantity, quote_amount) = match order.side {
            Side::Buy => (order.quote_amount / order.price, order.quote_amount),
            Side::Sell => (order.quantity, order.quantity * order.price),
        };

        let next = self
            .balances
            .apply_fill(order.side, order.reason, quantity, quote_amount)?;
        let realized_pnl = self.cost_basis.apply(order.side, order.reason, quote_amount);

        self.balances = next;

        tracing::info!(
            symbol = %order.symbol,
            "[SIM] {} {} @ {} for {} ({:?})",
            order.side,
            quantity,
            order.price,
            quote_amount,
            order.reason
        );

        Ok(TradeRecord {
            timestamp: Utc::now(),
            symbol: order.symbol.clone(),
            mode: ExecutionMode::Simulated,
            side: order.side,
            reason: order.reason,
            price: order.price,
            quantity,
            quote_amount,
            realized_pnl,
            balances: next,
            provisional: false,
        })
    }
}
