use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{Action, Balances};

/// Fixed-risk position sizing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SizerConfig {
    /// Quote amount put at risk per trade
    pub risk_per_trade: Decimal,
    /// Stop distance as a fraction of price; the floor when ATR sizing is on
    pub stop_loss_pct: Decimal,
    /// Stop distance in ATRs; `None` uses the fixed fraction only
    pub atr_multiplier: Option<Decimal>,
    pub min_trade_quote: Decimal,
    /// Base balances below this count as no position
    pub dust_threshold: Decimal,
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: dec!(2.5),
            stop_loss_pct: dec!(0.05),
            atr_multiplier: None,
            min_trade_quote: dec!(10),
            dust_threshold: dec!(0.00001),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizingDecision {
    pub approved: bool,
    pub quantity: Decimal,
    pub quote_amount: Decimal,
    pub reason: String,
}

impl SizingDecision {
    fn approve(quantity: Decimal, quote_amount: Decimal, reason: String) -> Self {
        Self {
            approved: true,
            quantity,
            quote_amount,
            reason,
        }
    }

    fn decline(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            quantity: Decimal::ZERO,
            quote_amount: Decimal::ZERO,
            reason: reason.into(),
        }
    }
}

/// Turns an action into a concrete trade size under a fixed risk budget
///
/// Buys risk `risk_per_trade` over the stop distance, so size shrinks as the
/// stop widens. Sells always liquidate the whole base balance.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: SizerConfig,
}

impl PositionSizer {
    pub fn new(config: SizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SizerConfig {
        &self.config
    }

    pub fn size(
        &self,
        action: Action,
        price: Decimal,
        atr: Option<Decimal>,
        balances: &Balances,
    ) -> SizingDecision {
        match action {
            Action::Hold => SizingDecision::decline("no-action"),
            Action::Buy => self.size_buy(price, atr, balances.quote_qty),
            Action::Sell => self.size_sell(price, balances.base_qty),
        }
    }

    /// Distance from entry to the protective stop
    pub fn stop_distance(&self, price: Decimal, atr: Option<Decimal>) -> Decimal {
        let floor = price * self.config.stop_loss_pct;
        match (self.config.atr_multiplier, atr) {
            (Some(multiplier), Some(atr)) => (atr * multiplier).max(floor),
            _ => floor,
        }
    }

    fn size_buy(&self, price: Decimal, atr: Option<Decimal>, available_quote: Decimal) -> SizingDecision {
        if price <= Decimal::ZERO {
            return SizingDecision::decline(format!("invalid price {}", price));
        }

        let stop_distance = self.stop_distance(price, atr);
        let quantity = self.config.risk_per_trade / stop_distance;
        let quote_amount = quantity * price;

        if quote_amount > available_quote {
            return SizingDecision::decline(format!(
                "insufficient quote balance: need {}, have {}",
                quote_amount, available_quote
            ));
        }
        if quote_amount < self.config.min_trade_quote {
            return SizingDecision::decline(format!(
                "below minimum trade size: {} < {}",
                quote_amount, self.config.min_trade_quote
            ));
        }

        SizingDecision::approve(
            quantity,
            quote_amount,
            format!("risking {} over stop distance {}", self.config.risk_per_trade, stop_distance),
        )
    }

    fn size_sell(&self, price: Decimal, available_base: Decimal) -> SizingDecision {
        if available_base < self.config.dust_threshold {
            return SizingDecision::decline(format!(
                "no position: base balance {} below dust threshold {}",
                available_base, self.config.dust_threshold
            ));
        }

        SizingDecision::approve(
            available_base,
            available_base * price,
            "full liquidation".to_string(),
        )
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self::new(SizerConfig::default())
    }
}
