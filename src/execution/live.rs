use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use super::gateway::{CostBasis, ExecutionGateway, OrderRequest};
use crate::api::{OrderAmount, TrackedAssets, Venue};
use crate::error::BotError;
use crate::models::{Balances, ExecutionMode, Side, TradeRecord};
use crate::Result;

/// Time-ordered client order id, unique per submission
pub fn new_idempotency_key() -> String {
    format!("bb{}", Uuid::now_v7().simple())
}

/// Real-money backend: market orders on the venue
pub struct LiveGateway {
    venue: Arc<dyn Venue>,
    assets: TrackedAssets,
    base_precision: u32,
    quote_precision: u32,
    cost_basis: CostBasis,
}

impl LiveGateway {
    pub fn new(
        venue: Arc<dyn Venue>,
        assets: TrackedAssets,
        base_precision: u32,
        quote_precision: u32,
        cost_basis: CostBasis,
    ) -> Self {
        Self {
            venue,
            assets,
            base_precision,
            quote_precision,
            cost_basis,
        }
    }

    fn order_amount(&self, order: &OrderRequest) -> Result<OrderAmount> {
        let amount = match order.side {
            Side::Buy => OrderAmount::Quote(
                order
                    .quote_amount
                    .round_dp_with_strategy(self.quote_precision, RoundingStrategy::ToZero),
            ),
            Side::Sell => OrderAmount::Base(
                order
                    .quantity
                    .round_dp_with_strategy(self.base_precision, RoundingStrategy::ToZero),
            ),
        };

        let value = match amount {
            OrderAmount::Quote(v) | OrderAmount::Base(v) => v,
        };
        if value <= Decimal::ZERO {
            return Err(BotError::OrderRejected(format!(
                "{} amount rounds to zero at configured precision",
                order.side
            )));
        }

        Ok(amount)
    }
}

#[async_trait]
impl ExecutionGateway for LiveGateway {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Live
    }

    async fn balances(&self) -> Result<Balances> {
        self.venue.get_balances(&self.assets).await
    }

    async fn execute(&mut self, order: &OrderRequest) -> Result<TradeRecord> {
        let amount = self.order_amount(order)?;
        let before = self.venue.get_balances(&self.assets).await?;

        let key = new_idempotency_key();
        let fill = self
            .venue
            .place_market_order(&order.symbol, order.side, amount, &key)
            .await?;

        let (quantity, quote_amount, price, mut provisional) = match fill.average_price() {
            Some(avg) => (fill.executed_qty, fill.quote_qty, avg, false),
            None => {
                tracing::warn!(
                    client_order_id = %fill.client_order_id,
                    "Venue reported no executed quantity; recording pre-trade estimate"
                );
                let (qty, quote) = match amount {
                    OrderAmount::Quote(q) => (q / order.price, q),
                    OrderAmount::Base(b) => (b, b * order.price),
                };
                (qty, quote, order.price, true)
            }
        };

        let balances = match self.venue.get_balances(&self.assets).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("Post-trade balance fetch failed ({}); recording estimate", e);
                provisional = true;
                match before.apply_fill(order.side, order.reason, quantity, quote_amount) {
                    Ok(estimate) => estimate,
                    Err(e) => {
                        tracing::warn!("Post-trade estimate failed ({}); recording pre-trade balances", e);
                        before
                    }
                }
            }
        };

        let realized_pnl = self.cost_basis.apply(order.side, order.reason, quote_amount);

        tracing::info!(
            symbol = %order.symbol,
            client_order_id = %fill.client_order_id,
            "[LIVE] {} {} @ {} for {} ({:?})",
            order.side,
            quantity,
            price,
            quote_amount,
            order.reason
        );

        Ok(TradeRecord {
            timestamp: Utc::now(),
            symbol: order.symbol.clone(),
            mode: ExecutionMode::Live,
            side: order.side,
            reason: order.reason,
            price,
            quantity,
            quote_amount,
            realized_pnl,
            balances,
            provisional,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Fill;
    use crate::models::TradeReason;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct FakeVenue {
        fill: Mutex<Option<Result<Fill>>>,
        balances: Mutex<Vec<Result<Balances>>>,
        orders: Mutex<Vec<(String, Side, OrderAmount, String)>>,
    }

    impl FakeVenue {
        fn new(fill: Result<Fill>, balances: Vec<Result<Balances>>) -> Arc<Self> {
            Arc::new(Self {
                fill: Mutex::new(Some(fill)),
                balances: Mutex::new(balances),
                orders: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Venue for FakeVenue {
        async fn get_balances(&self, _assets: &TrackedAssets) -> Result<Balances> {
            let mut queue = self.balances.lock().unwrap();
            if queue.is_empty() {
                Err(BotError::DataUnavailable("no balances queued".into()))
            } else {
                queue.remove(0)
            }
        }

        async fn place_market_order(
            &self,
            symbol: &str,
            side: Side,
            amount: OrderAmount,
            idempotency_key: &str,
        ) -> Result<Fill> {
            self.orders.lock().unwrap().push((
                symbol.to_string(),
                side,
                amount,
                idempotency_key.to_string(),
            ));
            self.fill
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(BotError::OrderRejected("no fill queued".into())))
        }
    }

    fn assets() -> TrackedAssets {
        TrackedAssets {
            base: "BTC".into(),
            quote: "USDT".into(),
            reserve: "USDC".into(),
        }
    }

    fn buy_request() -> OrderRequest {
        OrderRequest {
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            reason: TradeReason::Signal,
            quantity: dec!(0.002),
            quote_amount: dec!(50.004),
            price: dec!(25000),
        }
    }

    fn gateway(venue: Arc<FakeVenue>) -> LiveGateway {
        LiveGateway::new(venue, assets(), 5, 2, CostBasis::default())
    }

    #[test]
    fn test_idempotency_keys_are_distinct_and_short() {
        let a = new_idempotency_key();
        let b = new_idempotency_key();
        assert_ne!(a, b);
        assert!(a.len() <= 36);
        assert!(a.starts_with("bb"));
    }

    #[tokio::test]
    async fn test_records_confirmed_fill() {
        let venue = FakeVenue::new(
            Ok(Fill {
                client_order_id: "bbx".into(),
                executed_qty: dec!(0.00199),
                quote_qty: dec!(50),
            }),
            vec![
                Ok(Balances::new(dec!(0), dec!(1000))),
                Ok(Balances::new(dec!(0.00199), dec!(950))),
            ],
        );
        let mut gw = gateway(venue.clone());

        let record = gw.execute(&buy_request()).await.unwrap();

        assert_eq!(record.quantity, dec!(0.00199));
        assert_eq!(record.quote_amount, dec!(50));
        assert_eq!(record.balances, Balances::new(dec!(0.00199), dec!(950)));
        assert!(!record.provisional);

        let orders = venue.orders.lock().unwrap();
        assert_eq!(orders.len(), 1);
        // Quote amount truncated to quote precision
        assert_eq!(orders[0].2, OrderAmount::Quote(dec!(50.00)));
    }

    #[tokio::test]
    async fn test_missing_fill_is_provisional() {
        let venue = FakeVenue::new(
            Ok(Fill {
                client_order_id: "bbx".into(),
                executed_qty: dec!(0),
                quote_qty: dec!(0),
            }),
            vec![
                Ok(Balances::new(dec!(0), dec!(1000))),
                Ok(Balances::new(dec!(0.002), dec!(950))),
            ],
        );
        let mut gw = gateway(venue);

        let record = gw.execute(&buy_request()).await.unwrap();

        assert!(record.provisional);
        assert_eq!(record.price, dec!(25000));
        assert_eq!(record.quantity, dec!(0.002));
    }

    #[tokio::test]
    async fn test_post_trade_balance_failure_records_estimate() {
        let venue = FakeVenue::new(
            Ok(Fill {
                client_order_id: "bbx".into(),
                executed_qty: dec!(0.002),
                quote_qty: dec!(50),
            }),
            vec![Ok(Balances::new(dec!(0), dec!(1000)))],
        );
        let mut gw = gateway(venue);

        let record = gw.execute(&buy_request()).await.unwrap();

        assert!(record.provisional);
        assert_eq!(record.balances, Balances::new(dec!(0.002), dec!(950)));
    }

    #[tokio::test]
    async fn test_unreconcilable_estimate_keeps_pre_trade_balances() {
        // Venue filled more quote than the pre-trade snapshot showed
        let venue = FakeVenue::new(
            Ok(Fill {
                client_order_id: "bbx".into(),
                executed_qty: dec!(0.002),
                quote_qty: dec!(50),
            }),
            vec![Ok(Balances::new(dec!(0), dec!(20)))],
        );
        let mut gw = gateway(venue);

        let record = gw.execute(&buy_request()).await.unwrap();

        assert!(record.provisional);
        assert_eq!(record.balances, Balances::new(dec!(0), dec!(20)));
        assert_eq!(record.quote_amount, dec!(50));
    }

    #[tokio::test]
    async fn test_ambiguous_propagates() {
        let venue = FakeVenue::new(
            Err(BotError::Ambiguous {
                client_order_id: "bbx".into(),
                reason: "timeout".into(),
            }),
            vec![Ok(Balances::new(dec!(0), dec!(1000)))],
        );
        let mut gw = gateway(venue.clone());

        let result = gw.execute(&buy_request()).await;

        assert!(matches!(result, Err(BotError::Ambiguous { .. })));
        assert_eq!(venue.orders.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_net_pnl_on_sell() {
        let venue = FakeVenue::new(
            Ok(Fill {
                client_order_id: "bbs".into(),
                executed_qty: dec!(0.002),
                quote_qty: dec!(52),
            }),
            vec![
                Ok(Balances::new(dec!(0.002), dec!(950))),
                Ok(Balances::new(dec!(0), dec!(1002))),
            ],
        );
        let mut basis = CostBasis::default();
        basis.apply(Side::Buy, TradeReason::Signal, dec!(50));
        let mut gw = LiveGateway::new(venue, assets(), 5, 2, basis);

        let sell = OrderRequest {
            side: Side::Sell,
            quantity: dec!(0.002),
            quote_amount: dec!(52),
            price: dec!(26000),
            ..buy_request()
        };
        let record = gw.execute(&sell).await.unwrap();

        assert_eq!(record.realized_pnl, Some(dec!(2)));
        assert_eq!(record.price, dec!(26000));
    }

    #[tokio::test]
    async fn test_dust_amount_is_rejected_before_submission() {
        let venue = FakeVenue::new(
            Err(BotError::OrderRejected("unused".into())),
            vec![Ok(Balances::new(dec!(0.000001), dec!(0)))],
        );
        let mut gw = gateway(venue.clone());

        let sell = OrderRequest {
            side: Side::Sell,
            quantity: dec!(0.000001),
            ..buy_request()
        };
        let result = gw.execute(&sell).await;

        assert!(matches!(result, Err(BotError::OrderRejected(_))));
        assert!(venue.orders.lock().unwrap().is_empty());
    }
}
