use rust_decimal::Decimal;

/// Classified failures produced by one trading cycle.
///
/// The scheduler decides what to do from the variant alone:
/// - `DataUnavailable` / `IncompleteData`: back off and retry next cycle
/// - `OrderRejected`: log, keep state, resume the normal interval
/// - `Ambiguous`: halt order placement until an operator reconciles
/// - everything else is fatal
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("incomplete market data: {0}")]
    IncompleteData(String),

    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("order outcome unknown (client order id {client_order_id}): {reason}")]
    Ambiguous {
        client_order_id: String,
        reason: String,
    },

    #[error("insufficient {asset} balance: need {required}, have {available}")]
    InsufficientBalance {
        asset: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl BotError {
    /// Market-data failures: skip the cycle with a short backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, BotError::DataUnavailable(_) | BotError::IncompleteData(_))
    }

    /// Failures confined to the current cycle with no state change.
    pub fn is_cycle_local(&self) -> bool {
        matches!(self, BotError::OrderRejected(_))
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, BotError::Ambiguous { .. })
    }

    /// Anything not covered above stops the process.
    pub fn is_fatal(&self) -> bool {
        !(self.is_transient() || self.is_cycle_local() || self.is_ambiguous())
    }
}

impl From<csv::Error> for BotError {
    fn from(e: csv::Error) -> Self {
        BotError::Ledger(e.to_string())
    }
}

impl From<std::io::Error> for BotError {
    fn from(e: std::io::Error) -> Self {
        BotError::Ledger(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(BotError::DataUnavailable("timeout".into()).is_transient());
        assert!(BotError::IncompleteData("null close".into()).is_transient());
        assert!(BotError::OrderRejected("insufficient funds".into()).is_cycle_local());

        let ambiguous = BotError::Ambiguous {
            client_order_id: "bb123".into(),
            reason: "timeout".into(),
        };
        assert!(ambiguous.is_ambiguous());
        assert!(!ambiguous.is_fatal());

        assert!(BotError::Ledger("disk full".into()).is_fatal());
        assert!(BotError::InvariantViolation("negative balance".into()).is_fatal());
    }

    #[test]
    fn test_ambiguous_message_carries_order_id() {
        let err = BotError::Ambiguous {
            client_order_id: "bb0192".into(),
            reason: "request timed out".into(),
        };
        assert!(err.to_string().contains("bb0192"));
    }
}
