use std::fmt;
use std::time::Duration;

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::api::binance::DEFAULT_BASE_URL;
use crate::api::TrackedAssets;
use crate::error::BotError;
use crate::indicators::LONGEST_LOOKBACK;
use crate::models::{Balances, Timeframe};
use crate::risk::{ProfitSweep, SizerConfig};
use crate::strategy::StrategyConfig;
use crate::Result;

/// Environment variable prefix, e.g. `BANDBOT_SYMBOL=ETHUSDT`
pub const ENV_PREFIX: &str = "BANDBOT";

/// Runtime settings, read from `BANDBOT_*` environment variables
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Market
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub timeframe: Timeframe,
    pub candle_limit: usize,

    // Timing
    pub poll_interval_secs: u64,
    pub backoff_secs: u64,
    pub request_timeout_secs: u64,

    // Risk
    pub risk_per_trade: Decimal,
    pub stop_loss_pct: Decimal,
    pub atr_multiplier: Option<Decimal>,
    pub min_trade_quote: Decimal,
    pub dust_threshold: Decimal,

    // Profit sweep; a zero threshold disables it
    pub sweep_threshold: Decimal,
    pub sweep_symbol: String,
    pub sweep_asset: String,

    // Strategy
    pub stop_loss_factor: Decimal,
    pub oversold: Decimal,
    pub overbought: Decimal,
    pub entry_margin: Decimal,
    pub exit_margin: Decimal,
    pub trend_filter: bool,

    // Venue
    pub live: bool,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_base_url: String,

    // Ledger / simulated account
    pub ledger_path: String,
    pub initial_base: Decimal,
    pub initial_quote: Decimal,
    pub base_precision: u32,
    pub quote_precision: u32,
}

impl Default for Settings {
    fn default() -> Self {
        let strategy = StrategyConfig::default();
        let sizer = SizerConfig::default();

        Self {
            symbol: "BTCUSDT".to_string(),
            base_asset: "BTC".to_string(),
            quote_asset: "USDT".to_string(),
            timeframe: Timeframe::M15,
            candle_limit: 100,

            poll_interval_secs: 900, // one 15m bar
            backoff_secs: 60,
            request_timeout_secs: 10,

            risk_per_trade: sizer.risk_per_trade,
            stop_loss_pct: sizer.stop_loss_pct,
            atr_multiplier: sizer.atr_multiplier,
            min_trade_quote: sizer.min_trade_quote,
            dust_threshold: sizer.dust_threshold,

            sweep_threshold: dec!(40),
            sweep_symbol: "USDCUSDT".to_string(),
            sweep_asset: "USDC".to_string(),

            stop_loss_factor: strategy.stop_loss_factor,
            oversold: strategy.oversold,
            overbought: strategy.overbought,
            entry_margin: strategy.entry_margin,
            exit_margin: strategy.exit_margin,
            trend_filter: strategy.trend_filter,

            live: false,
            api_key: None,
            api_secret: None,
            api_base_url: DEFAULT_BASE_URL.to_string(),

            ledger_path: "trade_history.csv".to_string(),
            initial_base: Decimal::ZERO,
            initial_quote: dec!(1000),
            base_precision: 5,
            quote_precision: 2,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("symbol", &self.symbol)
            .field("timeframe", &self.timeframe)
            .field("candle_limit", &self.candle_limit)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("risk_per_trade", &self.risk_per_trade)
            .field("stop_loss_pct", &self.stop_loss_pct)
            .field("sweep_threshold", &self.sweep_threshold)
            .field("live", &self.live)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("ledger_path", &self.ledger_path)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Load from the process environment (after `.env` has been applied)
    pub fn load() -> Result<Self> {
        Self::build(config::Config::builder().add_source(Environment::with_prefix(ENV_PREFIX)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| BotError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 || self.backoff_secs == 0 || self.request_timeout_secs == 0 {
            return Err(BotError::Config("intervals and timeouts must be positive".into()));
        }
        if self.candle_limit < LONGEST_LOOKBACK {
            return Err(BotError::Config(format!(
                "candle_limit {} is below the longest indicator lookback {}",
                self.candle_limit, LONGEST_LOOKBACK
            )));
        }
        if self.stop_loss_pct <= Decimal::ZERO || self.stop_loss_pct >= Decimal::ONE {
            return Err(BotError::Config(format!(
                "stop_loss_pct must be in (0, 1), got {}",
                self.stop_loss_pct
            )));
        }
        if self.risk_per_trade <= Decimal::ZERO {
            return Err(BotError::Config("risk_per_trade must be positive".into()));
        }
        if self.sweep_threshold < Decimal::ZERO {
            return Err(BotError::Config("sweep_threshold cannot be negative".into()));
        }
        if self.initial_base < Decimal::ZERO || self.initial_quote < Decimal::ZERO {
            return Err(BotError::Config("initial balances cannot be negative".into()));
        }
        if self.live && (self.api_key.is_none() || self.api_secret.is_none()) {
            return Err(BotError::Config(
                "live mode requires BANDBOT_API_KEY and BANDBOT_API_SECRET".into(),
            ));
        }
        Ok(())
    }

    pub fn strategy_config(&self) -> StrategyConfig {
        StrategyConfig {
            stop_loss_factor: self.stop_loss_factor,
            oversold: self.oversold,
            overbought: self.overbought,
            entry_margin: self.entry_margin,
            exit_margin: self.exit_margin,
            trend_filter: self.trend_filter,
        }
    }

    pub fn sizer_config(&self) -> SizerConfig {
        SizerConfig {
            risk_per_trade: self.risk_per_trade,
            stop_loss_pct: self.stop_loss_pct,
            atr_multiplier: self.atr_multiplier,
            min_trade_quote: self.min_trade_quote,
            dust_threshold: self.dust_threshold,
        }
    }

    pub fn profit_sweep(&self) -> Option<ProfitSweep> {
        if self.sweep_threshold.is_zero() {
            None
        } else {
            Some(ProfitSweep::new(self.sweep_threshold, self.sweep_symbol.clone()))
        }
    }

    pub fn tracked_assets(&self) -> TrackedAssets {
        TrackedAssets {
            base: self.base_asset.clone(),
            quote: self.quote_asset.clone(),
            reserve: self.sweep_asset.clone(),
        }
    }

    pub fn initial_balances(&self) -> Balances {
        Balances::new(self.initial_base, self.initial_quote)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
