use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bandbot::api::{BinanceClient, MarketData};
use bandbot::execution::SimulatedGateway;
use bandbot::persistence::TradeLedger;
use bandbot::risk::{PositionSizer, ProfitSweep, SizerConfig};
use bandbot::scheduler::{CycleReport, SchedulerConfig};
use bandbot::strategy::BandReversionStrategy;
use bandbot::*;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

struct ReplayMarket {
    closes: Mutex<Vec<Decimal>>,
}

impl ReplayMarket {
    fn new(closes: Vec<Decimal>) -> Arc<Self> {
        Arc::new(Self {
            closes: Mutex::new(closes),
        })
    }

    fn push(&self, close: Decimal) {
        self.closes.lock().unwrap().push(close);
    }
}

#[async_trait]
impl MarketData for ReplayMarket {
    async fn recent_candles(
        &self,
        _symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> bandbot::Result<Vec<RawCandle>> {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let closes = self.closes.lock().unwrap();
        let skip = closes.len().saturating_sub(count);

        Ok(closes
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(i, &close)| RawCandle {
                open_time: start + timeframe.duration() * i as i32,
                open: Some(close),
                high: Some(close + dec!(0.5)),
                low: Some(close - dec!(0.5)),
                close: Some(close),
                volume: Some(dec!(3)),
            })
            .collect())
    }

    async fn last_price(&self, symbol: &str) -> bandbot::Result<Decimal> {
        match symbol {
            "USDCUSDT" => Ok(dec!(1)),
            "BTCUSDT" => self
                .closes
                .lock()
                .unwrap()
                .last()
                .copied()
                .ok_or_else(|| BotError::DataUnavailable("no ticker".into())),
            other => Err(BotError::DataUnavailable(format!("no price for {}", other))),
        }
    }
}

fn scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        symbol: "BTCUSDT".to_string(),
        timeframe: Timeframe::M15,
        candle_limit: 100,
        poll_interval: Duration::from_secs(900),
        backoff: Duration::from_secs(60),
    }
}

fn completed(outcome: CycleOutcome) -> CycleReport {
    match outcome {
        CycleOutcome::Completed(report) => report,
        other => panic!("expected completed cycle, got {:?}", other),
    }
}

#[tokio::test]
async fn test_e2e_round_trip_with_profit_sweep() {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("trade_history.csv");
    let initial = Balances::new(dec!(0), dec!(1000));

    // Flat market, then a sharp dip
    let mut closes = vec![dec!(100); 59];
    closes.push(dec!(80));
    let market = ReplayMarket::new(closes);

    let mut scheduler = Scheduler::new(
        scheduler_config(),
        market.clone(),
        Box::new(SimulatedGateway::new(initial)),
        TradeLedger::open(&ledger_path).unwrap(),
        Box::new(BandReversionStrategy::default()),
        PositionSizer::new(SizerConfig::default()),
        Some(ProfitSweep::new(dec!(30), "USDCUSDT")),
    );

    // 1. Oversold dip under the lower band: buy
    let report = completed(scheduler.run_cycle().await.unwrap());
    assert_eq!(report.signal.action, Action::Buy);
    let buy = report.trade.expect("buy should settle");
    assert_eq!(buy.quote_amount, dec!(50));
    assert_eq!(buy.balances, Balances::new(dec!(0.625), dec!(950)));
    assert_eq!(scheduler.state().stop_loss_price(), Some(dec!(80)));

    // 2. Same bar again: the setup still holds, so it adds to the position
    let report = completed(scheduler.run_cycle().await.unwrap());
    assert_eq!(report.signal.action, Action::Buy);
    assert!(report.trade.is_some());
    assert_eq!(scheduler.ledger().len(), 2);

    // 3. Spike over the upper band with RSI overbought: sell everything, then sweep
    market.push(dec!(130));
    let report = completed(scheduler.run_cycle().await.unwrap());
    assert_eq!(report.signal.action, Action::Sell);
    assert_eq!(report.signal.reason, TradeReason::Signal);

    let sell = report.trade.expect("sell should settle");
    assert_eq!(sell.quantity, dec!(1.25));
    assert_eq!(sell.quote_amount, dec!(162.5));
    // 162.5 proceeds - 100 spent over two buys
    assert_eq!(sell.realized_pnl, Some(dec!(62.5)));
    assert_eq!(scheduler.state().stop_loss_price(), None);

    let sweep = report.sweep.expect("sweep should fire");
    assert_eq!(sweep.reason, TradeReason::Sweep);
    assert_eq!(sweep.quote_amount, dec!(30));
    assert_eq!(sweep.balances.reserve_qty, dec!(30));
    // One threshold per cycle; the rest carries over
    assert_eq!(scheduler.state().realized_profit_accumulator(), dec!(32.5));

    // 4. Ledger survives a restart and reconciles
    assert_eq!(scheduler.ledger().len(), 4);
    let reopened = TradeLedger::open(&ledger_path).unwrap();
    assert_eq!(reopened.records(), scheduler.ledger().records());
    assert!(reopened.verify_balances(initial).is_ok());
    assert_eq!(
        reopened.last_balances(),
        Some(Balances {
            base_qty: dec!(0),
            quote_qty: dec!(1032.5),
            reserve_qty: dec!(30),
        })
    );
    assert_eq!(
        reopened
            .cost_basis(ExecutionMode::Simulated, "BTCUSDT")
            .open_cost(),
        Decimal::ZERO
    );

    let content = std::fs::read_to_string(&ledger_path).unwrap();
    assert!(content.starts_with("timestamp,symbol,mode,side,reason,price"));
    assert!(content.contains(",sweep,"));
}

#[tokio::test]
async fn test_e2e_stop_loss_exit_leaves_accumulator_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut closes = vec![dec!(100); 59];
    closes.push(dec!(80));
    let market = ReplayMarket::new(closes);

    let mut scheduler = Scheduler::new(
        scheduler_config(),
        market.clone(),
        Box::new(SimulatedGateway::new(Balances::new(dec!(0), dec!(1000)))),
        TradeLedger::open(dir.path().join("trades.csv")).unwrap(),
        Box::new(BandReversionStrategy::default()),
        PositionSizer::default(),
        Some(ProfitSweep::new(dec!(40), "USDCUSDT")),
    );

    completed(scheduler.run_cycle().await.unwrap());

    market.push(dec!(60));
    let report = completed(scheduler.run_cycle().await.unwrap());

    assert_eq!(report.signal.reason, TradeReason::StopLoss);
    assert!(report.sweep.is_none());
    assert_eq!(scheduler.state().realized_profit_accumulator(), Decimal::ZERO);
    assert_eq!(scheduler.state().stop_loss_price(), None);
}

#[tokio::test]
async fn test_e2e_hold_cycle_over_http_market_data() {
    let mut server = mockito::Server::new_async().await;

    let start_ms: i64 = 1_717_200_000_000;
    let rows: Vec<String> = (0..60)
        .map(|i| {
            let t = start_ms + i * 900_000;
            format!(
                r#"[{t},"100.00","100.50","99.50","100.00","4.2",{close},"420",12,"2","200","0"]"#,
                t = t,
                close = t + 899_999
            )
        })
        .collect();
    server
        .mock("GET", "/api/v3/klines")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(format!("[{}]", rows.join(",")))
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = BinanceClient::new(server.url(), Duration::from_secs(5)).unwrap();

    let mut scheduler = Scheduler::new(
        scheduler_config(),
        Arc::new(client),
        Box::new(SimulatedGateway::new(Balances::new(dec!(0), dec!(1000)))),
        TradeLedger::open(dir.path().join("trades.csv")).unwrap(),
        Box::new(BandReversionStrategy::default()),
        PositionSizer::default(),
        None,
    );

    let report = completed(scheduler.run_cycle().await.unwrap());
    assert_eq!(report.signal.action, Action::Hold);
    assert_eq!(report.close, dec!(100));
    assert!(scheduler.ledger().is_empty());
}

#[tokio::test]
async fn test_e2e_market_outage_skips_cycle() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/v3/klines")
        .match_query(mockito::Matcher::Any)
        .with_status(502)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = BinanceClient::new(server.url(), Duration::from_secs(5)).unwrap();

    let mut scheduler = Scheduler::new(
        scheduler_config(),
        Arc::new(client),
        Box::new(SimulatedGateway::new(Balances::new(dec!(0), dec!(1000)))),
        TradeLedger::open(dir.path().join("trades.csv")).unwrap(),
        Box::new(BandReversionStrategy::default()),
        PositionSizer::default(),
        None,
    );

    let outcome = scheduler.run_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Skipped(_)));
    assert_eq!(*scheduler.state(), bandbot::strategy::EngineState::new());
}
