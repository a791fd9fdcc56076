use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BotError;
use crate::execution::CostBasis;
use crate::models::{Balances, ExecutionMode, Side, TradeReason, TradeRecord};
use crate::Result;

/// Realized P&L column value for trades that realize nothing
pub const NOT_APPLICABLE: &str = "-";

/// One CSV row; column order is the file schema
#[derive(Debug, Serialize, Deserialize)]
struct LedgerRow {
    timestamp: DateTime<Utc>,
    symbol: String,
    mode: ExecutionMode,
    side: Side,
    reason: TradeReason,
    #[serde(with = "rust_decimal::serde::str")]
    price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    quote_amount: Decimal,
    realized_pnl: String,
    #[serde(with = "rust_decimal::serde::str")]
    base_balance: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    quote_balance: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    reserve_balance: Decimal,
    provisional: bool,
}

impl From<&TradeRecord> for LedgerRow {
    fn from(record: &TradeRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            symbol: record.symbol.clone(),
            mode: record.mode,
            side: record.side,
            reason: record.reason,
            price: record.price,
            quantity: record.quantity,
            quote_amount: record.quote_amount,
            realized_pnl: record
                .realized_pnl
                .map(|p| p.to_string())
                .unwrap_or_else(|| NOT_APPLICABLE.to_string()),
            base_balance: record.balances.base_qty,
            quote_balance: record.balances.quote_qty,
            reserve_balance: record.balances.reserve_qty,
            provisional: record.provisional,
        }
    }
}

impl TryFrom<LedgerRow> for TradeRecord {
    type Error = BotError;

    fn try_from(row: LedgerRow) -> Result<Self> {
        let realized_pnl = match row.realized_pnl.trim() {
            NOT_APPLICABLE | "" => None,
            value => Some(Decimal::from_str(value).map_err(|e| {
                BotError::Ledger(format!("invalid realized_pnl '{}': {}", value, e))
            })?),
        };

        Ok(TradeRecord {
            timestamp: row.timestamp,
            symbol: row.symbol,
            mode: row.mode,
            side: row.side,
            reason: row.reason,
            price: row.price,
            quantity: row.quantity,
            quote_amount: row.quote_amount,
            realized_pnl,
            balances: Balances {
                base_qty: row.base_balance,
                quote_qty: row.quote_balance,
                reserve_qty: row.reserve_balance,
            },
            provisional: row.provisional,
        })
    }
}

/// Append-only CSV trade history
///
/// Each append is flushed and synced before returning. Appends are not
/// idempotent: call once per confirmed execution.
pub struct TradeLedger {
    path: PathBuf,
    records: Vec<TradeRecord>,
}

impl TradeLedger {
    /// Open (or create on first append) the ledger at `path`, loading prior rows
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let records = if path.exists() {
            recover_torn_tail(&path)?;
            Self::load(&path)?
        } else {
            Vec::new()
        };

        tracing::info!("Loaded {} trades from ledger {}", records.len(), path.display());

        Ok(Self { path, records })
    }

    /// Read every row of the ledger at `path`, in file order
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<TradeRecord>> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| BotError::Ledger(format!("failed to read {}: {}", path.display(), e)))?;

        reader
            .deserialize::<LedgerRow>()
            .map(|row| TradeRecord::try_from(row?))
            .collect()
    }

    pub fn append(&mut self, record: &TradeRecord) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| BotError::Ledger(format!("failed to open {}: {}", self.path.display(), e)))?;

        let write_header = file.metadata()?.len() == 0;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(write_header)
                .from_writer(&file);
            writer.serialize(LedgerRow::from(record))?;
            writer.flush()?;
        }
        file.sync_data()?;

        self.records.push(record.clone());

        tracing::debug!(
            "Ledger append: {} {} @ {} ({} rows)",
            record.side,
            record.quantity,
            record.price,
            self.records.len()
        );

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Balances after the most recent trade
    pub fn last_balances(&self) -> Option<Balances> {
        self.records.last().map(|r| r.balances)
    }

    /// Quote spent on `symbol` buys since its last sell, counting only `mode` rows
    pub fn cost_basis(&self, mode: ExecutionMode, symbol: &str) -> CostBasis {
        CostBasis::from_records(&self.records, mode, symbol)
    }

    /// Replay simulated rows from `initial` and check each row's balances.
    ///
    /// Live rows carry venue-reported balances and re-seed the replay.
    pub fn verify_balances(&self, initial: Balances) -> Result<()> {
        let mut expected = initial;

        for (index, record) in self.records.iter().enumerate() {
            if record.mode == ExecutionMode::Live {
                expected = record.balances;
                continue;
            }

            expected = expected
                .apply_fill(record.side, record.reason, record.quantity, record.quote_amount)
                .map_err(|e| BotError::InvariantViolation(format!("ledger row {}: {}", index + 1, e)))?;

            if expected != record.balances {
                return Err(BotError::InvariantViolation(format!(
                    "ledger row {}: recorded balances {:?} differ from replayed {:?}",
                    index + 1,
                    record.balances,
                    expected
                )));
            }
        }

        Ok(())
    }
}

/// Drop a trailing partial row left by a crash mid-write
fn recover_torn_tail(path: &Path) -> Result<()> {
    let bytes = fs::read(path)?;
    if bytes.is_empty() || bytes.ends_with(b"\n") {
        return Ok(());
    }

    let keep = bytes
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);

    tracing::warn!(
        "Ledger {} ends with a partial row ({} bytes); truncating",
        path.display(),
        bytes.len() - keep
    );

    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(keep as u64)?;
    file.sync_data()?;

    Ok(())
}
