use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::api::MarketData;
use crate::config::Settings;
use crate::error::BotError;
use crate::execution::{CandleWindow, ExecutionGateway, OrderRequest};
use crate::indicators::{self, LONGEST_LOOKBACK};
use crate::models::{Action, Side, Timeframe, TradeReason, TradeRecord};
use crate::persistence::TradeLedger;
use crate::risk::{PositionSizer, ProfitSweep, SweepPlan};
use crate::strategy::{EngineState, Signal, Strategy};
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candle_limit: usize,
    pub poll_interval: Duration,
    pub backoff: Duration,
}

impl From<&Settings> for SchedulerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            symbol: settings.symbol.clone(),
            timeframe: settings.timeframe,
            candle_limit: settings.candle_limit,
            poll_interval: settings.poll_interval(),
            backoff: settings.backoff(),
        }
    }
}

/// What one completed cycle did
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub close: Decimal,
    pub signal: Signal,
    pub trade: Option<TradeRecord>,
    pub sweep: Option<TradeRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Data not usable this cycle; retry after the backoff
    Skipped(String),
    /// Order placement halted on an unresolved order (client order id)
    Halted(String),
}

enum TradeAttempt {
    Settled(TradeRecord),
    /// Declined, rejected or unresolved; nothing recorded
    NotSettled,
    /// Could not size this cycle
    Deferred(String),
}

/// The polling loop: one strictly sequential cycle per interval
pub struct Scheduler {
    config: SchedulerConfig,
    market: Arc<dyn MarketData>,
    gateway: Box<dyn ExecutionGateway>,
    ledger: TradeLedger,
    strategy: Box<dyn Strategy>,
    sizer: PositionSizer,
    sweep: Option<ProfitSweep>,
    state: EngineState,
    halted_on: Option<String>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        market: Arc<dyn MarketData>,
        gateway: Box<dyn ExecutionGateway>,
        ledger: TradeLedger,
        strategy: Box<dyn Strategy>,
        sizer: PositionSizer,
        sweep: Option<ProfitSweep>,
    ) -> Self {
        Self {
            config,
            market,
            gateway,
            ledger,
            strategy,
            sizer,
            sweep,
            state: EngineState::new(),
            halted_on: None,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn gateway(&self) -> &dyn ExecutionGateway {
        self.gateway.as_ref()
    }

    pub fn halted_on(&self) -> Option<&str> {
        self.halted_on.as_deref()
    }

    /// Run cycles until a fatal error
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!(
            "🔄 Trading loop started: {} on {} every {}s using {} ({} execution)",
            self.config.symbol,
            self.config.timeframe,
            self.config.poll_interval.as_secs(),
            self.strategy.name(),
            self.gateway.mode()
        );

        loop {
            let delay = match self.run_cycle().await? {
                CycleOutcome::Completed(_) | CycleOutcome::Halted(_) => self.config.poll_interval,
                CycleOutcome::Skipped(_) => self.config.backoff,
            };
            tokio::time::sleep(delay).await;
        }
    }

    /// One full cycle. Only fatal errors are returned as `Err`.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        if let Some(key) = self.halted_on.clone() {
            self.report_halt(&key).await;
            return Ok(CycleOutcome::Halted(key));
        }

        let window = match CandleWindow::refresh(
            self.market.as_ref(),
            &self.config.symbol,
            self.config.timeframe,
            self.config.candle_limit,
        )
        .await
        {
            Ok(window) => window,
            Err(e) if e.is_transient() => {
                tracing::warn!("⚠️  Skipping cycle: {}", e);
                return Ok(CycleOutcome::Skipped(e.to_string()));
            }
            Err(e) => return Err(e),
        };

        if !window.is_decision_ready() {
            let reason = format!("warming up: {}/{} candles", window.len(), LONGEST_LOOKBACK);
            tracing::warn!("⏳ Skipping cycle, {}", reason);
            return Ok(CycleOutcome::Skipped(reason));
        }

        let snapshot = indicators::compute(window.candles());
        let Some(close) = snapshot.close else {
            return Ok(CycleOutcome::Skipped("no close price".to_string()));
        };
        let missing = snapshot.missing_fields(true);
        if !missing.is_empty() {
            let reason = format!("indicators undefined: {}", missing.join(", "));
            tracing::warn!("⚠️  Skipping cycle, {}", reason);
            return Ok(CycleOutcome::Skipped(reason));
        }

        let signal = self.strategy.evaluate(&snapshot, &self.state);
        tracing::debug!("Signal {:?}: {}", signal.action, signal.rationale);

        let trade = match signal.action {
            Action::Hold => None,
            Action::Buy | Action::Sell => match self.act_on(&signal, snapshot.atr).await? {
                TradeAttempt::Settled(record) => Some(record),
                TradeAttempt::NotSettled => None,
                TradeAttempt::Deferred(reason) => return Ok(CycleOutcome::Skipped(reason)),
            },
        };

        if let Some(key) = self.halted_on.clone() {
            return Ok(CycleOutcome::Halted(key));
        }

        let sweep = self.sweep_profit().await?;

        if let Some(key) = self.halted_on.clone() {
            return Ok(CycleOutcome::Halted(key));
        }

        let report = CycleReport {
            close,
            signal,
            trade,
            sweep,
        };
        self.log_report(&report).await;

        Ok(CycleOutcome::Completed(report))
    }

    /// Size and execute a Buy/Sell at the ticker price, committing stop state
    /// only on a settled trade
    async fn act_on(&mut self, signal: &Signal, atr: Option<Decimal>) -> Result<TradeAttempt> {
        let price = match self.market.last_price(&self.config.symbol).await {
            Ok(p) => p,
            Err(e) if e.is_transient() => {
                tracing::warn!("⚠️  Ticker fetch failed: {}", e);
                return Ok(TradeAttempt::Deferred(e.to_string()));
            }
            Err(e) => return Err(e),
        };

        let balances = match self.gateway.balances().await {
            Ok(b) => b,
            Err(e) if e.is_transient() => {
                tracing::warn!("⚠️  Balance fetch failed: {}", e);
                return Ok(TradeAttempt::Deferred(e.to_string()));
            }
            Err(e) => return Err(e),
        };

        let decision = self.sizer.size(signal.action, price, atr, &balances);
        if !decision.approved {
            tracing::warn!("{:?} declined: {}", signal.action, decision.reason);
            if signal.action == Action::Sell {
                // Nothing left to protect
                self.state.clear_stop();
            }
            return Ok(TradeAttempt::NotSettled);
        }

        let side = match signal.action {
            Action::Buy => Side::Buy,
            _ => Side::Sell,
        };
        let order = OrderRequest {
            symbol: self.config.symbol.clone(),
            side,
            reason: signal.reason,
            quantity: decision.quantity,
            quote_amount: decision.quote_amount,
            price,
        };

        let Some(record) = self.submit(&order).await? else {
            return Ok(TradeAttempt::NotSettled);
        };

        match record.side {
            Side::Buy => self.state.arm_stop(price),
            Side::Sell => {
                self.state.clear_stop();
                if let Some(pnl) = record.realized_pnl {
                    self.state.credit_profit(pnl);
                }
            }
        }

        Ok(TradeAttempt::Settled(record))
    }

    /// Execute and append to the ledger. Non-fatal failures yield `None`.
    async fn submit(&mut self, order: &OrderRequest) -> Result<Option<TradeRecord>> {
        match self.gateway.execute(order).await {
            Ok(record) => {
                self.ledger.append(&record)?;
                Ok(Some(record))
            }
            Err(BotError::Ambiguous {
                client_order_id,
                reason,
            }) => {
                tracing::error!(
                    client_order_id = %client_order_id,
                    "🛑 Order outcome unknown ({}); halting order placement until reconciled",
                    reason
                );
                self.halted_on = Some(client_order_id);
                Ok(None)
            }
            Err(e) if e.is_cycle_local() || e.is_transient() => {
                tracing::error!("❌ {} {} not executed: {}", order.side, order.symbol, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sweep_profit(&mut self) -> Result<Option<TradeRecord>> {
        let Some(sweep) = self.sweep.clone() else {
            return Ok(None);
        };
        if !sweep.is_due(&self.state) {
            return Ok(None);
        }

        let price = match self.market.last_price(sweep.symbol()).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("⚠️  Sweep deferred, no {} price: {}", sweep.symbol(), e);
                return Ok(None);
            }
        };
        let balances = match self.gateway.balances().await {
            Ok(b) => b,
            Err(e) if e.is_transient() => {
                tracing::warn!("⚠️  Sweep deferred, balance fetch failed: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match sweep.plan(&self.state, price, &balances) {
            SweepPlan::Idle => Ok(None),
            SweepPlan::Declined(reason) => {
                tracing::warn!("Sweep declined: {}", reason);
                Ok(None)
            }
            SweepPlan::Order(order) => {
                let record = self.submit(&order).await?;
                if record.is_some() {
                    sweep.settle(&mut self.state);
                    tracing::info!(
                        "💰 Swept {} into {} (accumulator now {})",
                        sweep.threshold(),
                        sweep.symbol(),
                        self.state.realized_profit_accumulator()
                    );
                }
                Ok(record)
            }
        }
    }

    async fn report_halt(&self, key: &str) {
        let recorded = self.ledger.last_balances();
        match self.gateway.balances().await {
            Ok(venue) => tracing::error!(
                client_order_id = %key,
                "🛑 Halted: reconcile order manually. Venue balances {:?}, last ledger balances {:?}",
                venue,
                recorded
            ),
            Err(e) => tracing::error!(
                client_order_id = %key,
                "🛑 Halted: reconcile order manually. Venue balances unavailable ({}), last ledger balances {:?}",
                e,
                recorded
            ),
        }
    }

    async fn log_report(&self, report: &CycleReport) {
        let balances = self.gateway.balances().await.ok();

        let traded = match (&report.trade, &report.sweep) {
            (Some(t), Some(_)) => format!("{} {} + sweep", t.side, t.quantity),
            (Some(t), None) => format!("{} {}", t.side, t.quantity),
            (None, Some(_)) => "sweep".to_string(),
            (None, None) => "none".to_string(),
        };

        tracing::info!(
            symbol = %self.config.symbol,
            "📊 close={} signal={:?} ({}) traded={} stop={:?} profit_acc={} balances={:?}",
            report.close,
            report.signal.action,
            match report.signal.reason {
                TradeReason::StopLoss => "stop-loss",
                TradeReason::Sweep => "sweep",
                TradeReason::Signal => "signal",
            },
            traded,
            self.state.stop_loss_price(),
            self.state.realized_profit_accumulator(),
            balances
        );
    }
}
