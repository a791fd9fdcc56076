use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BotError;

/// Bar interval requested from the market-data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::minutes(1),
            Timeframe::M3 => Duration::minutes(3),
            Timeframe::M5 => Duration::minutes(5),
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::M30 => Duration::minutes(30),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
            Timeframe::D1 => Duration::days(1),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(Timeframe::M1),
            "3m" => Ok(Timeframe::M3),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(BotError::Config(format!("unknown timeframe '{}'", other))),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = BotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.as_str().to_string()
    }
}

/// Bar as delivered by the market-data provider; any field may be missing
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandle {
    pub open_time: DateTime<Utc>,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub volume: Option<Decimal>,
}

/// Validated OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Decision produced once per cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("Buy"),
            Side::Sell => f.write_str("Sell"),
        }
    }
}

/// Why a trade was placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeReason {
    Signal,
    StopLoss,
    Sweep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Simulated,
    Live,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Simulated => f.write_str("simulated"),
            ExecutionMode::Live => f.write_str("live"),
        }
    }
}

/// Asset holdings: traded base asset, quote asset, and swept reserve asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balances {
    pub base_qty: Decimal,
    pub quote_qty: Decimal,
    pub reserve_qty: Decimal,
}

impl Balances {
    pub fn new(base_qty: Decimal, quote_qty: Decimal) -> Self {
        Self {
            base_qty,
            quote_qty,
            reserve_qty: Decimal::ZERO,
        }
    }

    /// Balances after a fill of `quantity` units for `quote_amount` of quote asset.
    ///
    /// Sweep buys credit the reserve asset instead of the base asset.
    /// Fails if any balance would go negative.
    pub fn apply_fill(
        &self,
        side: Side,
        reason: TradeReason,
        quantity: Decimal,
        quote_amount: Decimal,
    ) -> Result<Balances, BotError> {
        let mut next = *self;
        match (side, reason) {
            (Side::Buy, TradeReason::Sweep) => {
                next.quote_qty -= quote_amount;
                next.reserve_qty += quantity;
            }
            (Side::Buy, _) => {
                next.quote_qty -= quote_amount;
                next.base_qty += quantity;
            }
            (Side::Sell, _) => {
                next.base_qty -= quantity;
                next.quote_qty += quote_amount;
            }
        }

        if next.quote_qty < Decimal::ZERO {
            return Err(BotError::InsufficientBalance {
                asset: "quote".to_string(),
                required: quote_amount,
                available: self.quote_qty,
            });
        }
        if next.base_qty < Decimal::ZERO {
            return Err(BotError::InsufficientBalance {
                asset: "base".to_string(),
                required: quantity,
                available: self.base_qty,
            });
        }

        Ok(next)
    }
}

/// One settled trade; immutable once appended to the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub mode: ExecutionMode,
    pub side: Side,
    pub reason: TradeReason,
    pub price: Decimal,
    pub quantity: Decimal,
    pub quote_amount: Decimal,
    pub realized_pnl: Option<Decimal>,
    pub balances: Balances,
    /// Quantity/price are pre-trade estimates rather than confirmed fill data
    pub provisional: bool,
}
