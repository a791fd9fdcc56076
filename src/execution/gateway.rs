use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{Balances, ExecutionMode, Side, TradeReason, TradeRecord};
use crate::Result;

/// A sized trade ready for execution
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub reason: TradeReason,
    /// Base units; authoritative for sells
    pub quantity: Decimal,
    /// Quote amount; authoritative for buys
    pub quote_amount: Decimal,
    /// Reference price the trade was sized at
    pub price: Decimal,
}

/// Executes sized trades against one backend
///
/// The scheduler only talks to this trait, so simulated and live runs share
/// every code path above it.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    async fn balances(&self) -> Result<Balances>;

    /// Execute `order` and return the settled record. Nothing is recorded on error.
    async fn execute(&mut self, order: &OrderRequest) -> Result<TradeRecord>;
}

/// Quote spent on buys since the last full sell
///
/// Realized P&L of a sell is its proceeds minus this amount. Sweep trades
/// never touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CostBasis {
    open_cost: Decimal,
}

impl CostBasis {
    /// Rebuild from the settled history of one mode and symbol, assuming a flat
    /// position before the first matching record
    pub fn from_records(records: &[TradeRecord], mode: ExecutionMode, symbol: &str) -> Self {
        let mut basis = Self::default();
        for record in records
            .iter()
            .filter(|r| r.mode == mode && r.symbol == symbol)
        {
            basis.apply(record.side, record.reason, record.quote_amount);
        }
        basis
    }

    pub fn open_cost(&self) -> Decimal {
        self.open_cost
    }

    /// Register a trade; returns the realized P&L for a sell
    pub fn apply(&mut self, side: Side, reason: TradeReason, quote_amount: Decimal) -> Option<Decimal> {
        match (side, reason) {
            (_, TradeReason::Sweep) => None,
            (Side::Buy, _) => {
                self.open_cost += quote_amount;
                None
            }
            (Side::Sell, _) => {
                let pnl = quote_amount - self.open_cost;
                self.open_cost = Decimal::ZERO;
                Some(pnl)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn record(side: Side, reason: TradeReason, quote_amount: Decimal) -> TradeRecord {
        TradeRecord {
            timestamp: Utc::now(),
            symbol: "BTCUSDT".to_string(),
            mode: ExecutionMode::Simulated,
            side,
            reason,
            price: dec!(100),
            quantity: quote_amount / dec!(100),
            quote_amount,
            realized_pnl: None,
            balances: Balances::default(),
            provisional: false,
        }
    }

    #[test]
    fn test_pnl_is_net_of_all_buys() {
        let mut basis = CostBasis::default();
        assert_eq!(basis.apply(Side::Buy, TradeReason::Signal, dec!(50)), None);
        assert_eq!(basis.apply(Side::Buy, TradeReason::Signal, dec!(30)), None);
        assert_eq!(basis.open_cost(), dec!(80));

        assert_eq!(basis.apply(Side::Sell, TradeReason::StopLoss, dec!(76)), Some(dec!(-4)));
        assert_eq!(basis.open_cost(), Decimal::ZERO);
    }

    #[test]
    fn test_sweep_does_not_affect_basis() {
        let mut basis = CostBasis::default();
        basis.apply(Side::Buy, TradeReason::Signal, dec!(50));
        assert_eq!(basis.apply(Side::Buy, TradeReason::Sweep, dec!(40)), None);
        assert_eq!(basis.open_cost(), dec!(50));
    }

    #[test]
    fn test_rebuild_from_records() {
        let records = vec![
            record(Side::Buy, TradeReason::Signal, dec!(50)),
            record(Side::Sell, TradeReason::Signal, dec!(52)),
            record(Side::Buy, TradeReason::Sweep, dec!(40)),
            record(Side::Buy, TradeReason::Signal, dec!(25)),
        ];

        let basis = CostBasis::from_records(&records, ExecutionMode::Simulated, "BTCUSDT");
        assert_eq!(basis.open_cost(), dec!(25));
        let empty = CostBasis::from_records(&[], ExecutionMode::Simulated, "BTCUSDT");
        assert_eq!(empty.open_cost(), Decimal::ZERO);
    }

    #[test]
    fn test_rebuild_ignores_other_modes_and_symbols() {
        let mut live_buy = record(Side::Buy, TradeReason::Signal, dec!(20));
        live_buy.mode = ExecutionMode::Live;
        let mut other_pair = record(Side::Buy, TradeReason::Signal, dec!(70));
        other_pair.symbol = "ETHUSDT".to_string();

        let records = vec![
            record(Side::Buy, TradeReason::Signal, dec!(50)),
            live_buy,
            other_pair,
        ];

        let simulated = CostBasis::from_records(&records, ExecutionMode::Simulated, "BTCUSDT");
        assert_eq!(simulated.open_cost(), dec!(50));
        let live = CostBasis::from_records(&records, ExecutionMode::Live, "BTCUSDT");
        assert_eq!(live.open_cost(), dec!(20));
    }
}
