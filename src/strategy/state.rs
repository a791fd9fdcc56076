use rust_decimal::Decimal;

/// The only state carried between cycles
///
/// Lives for the process lifetime. A fresh process starts with no active
/// stop and an empty accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineState {
    stop_loss_price: Option<Decimal>,
    realized_profit_accumulator: Decimal,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_loss_price(&self) -> Option<Decimal> {
        self.stop_loss_price
    }

    pub fn realized_profit_accumulator(&self) -> Decimal {
        self.realized_profit_accumulator
    }

    /// Arm the stop at the entry close; replaces any existing stop
    pub fn arm_stop(&mut self, price: Decimal) {
        self.stop_loss_price = Some(price);
    }

    pub fn clear_stop(&mut self) {
        self.stop_loss_price = None;
    }

    /// Add a sell's realized P&L. Losses eat into unswept profit but never push it below zero.
    pub fn credit_profit(&mut self, pnl: Decimal) {
        self.realized_profit_accumulator = (self.realized_profit_accumulator + pnl).max(Decimal::ZERO);
    }

    pub(crate) fn debit_profit(&mut self, amount: Decimal) {
        self.realized_profit_accumulator -= amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_stop_overwrite_and_clear() {
        let mut state = EngineState::new();
        assert_eq!(state.stop_loss_price(), None);

        state.arm_stop(dec!(100));
        state.arm_stop(dec!(95));
        assert_eq!(state.stop_loss_price(), Some(dec!(95)));

        state.clear_stop();
        assert_eq!(state.stop_loss_price(), None);
    }

    #[test]
    fn test_losses_offset_profit_down_to_zero() {
        let mut state = EngineState::new();
        state.credit_profit(dec!(15));
        state.credit_profit(dec!(-5));
        assert_eq!(state.realized_profit_accumulator(), dec!(10));

        state.credit_profit(dec!(-20));
        assert_eq!(state.realized_profit_accumulator(), Decimal::ZERO);
    }
}
