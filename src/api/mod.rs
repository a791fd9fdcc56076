// External collaborators: market data and trading venue
pub mod binance;

pub use binance::BinanceClient;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{Balances, RawCandle, Side, Timeframe};
use crate::Result;

/// Read-only market data
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Most recent `count` bars, oldest first. Fails with `DataUnavailable`.
    async fn recent_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<RawCandle>>;

    /// Last traded price. Fails with `DataUnavailable`.
    async fn last_price(&self, symbol: &str) -> Result<Decimal>;
}

/// How much a market order should trade
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderAmount {
    /// Spend this much quote asset
    Quote(Decimal),
    /// Sell/buy this many base units
    Base(Decimal),
}

/// Venue confirmation of an executed market order
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub client_order_id: String,
    pub executed_qty: Decimal,
    pub quote_qty: Decimal,
}

impl Fill {
    /// Average fill price, when anything executed
    pub fn average_price(&self) -> Option<Decimal> {
        if self.executed_qty.is_zero() {
            None
        } else {
            Some(self.quote_qty / self.executed_qty)
        }
    }
}

/// Assets whose balances the bot tracks on the venue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedAssets {
    pub base: String,
    pub quote: String,
    pub reserve: String,
}

/// Order placement with real financial effect
#[async_trait]
pub trait Venue: Send + Sync {
    async fn get_balances(&self, assets: &TrackedAssets) -> Result<Balances>;

    /// Submit a market order. Fails with `OrderRejected` when the venue declined it
    /// and with `Ambiguous` when the outcome is unknown; never retried here.
    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        amount: OrderAmount,
        idempotency_key: &str,
    ) -> Result<Fill>;
}
