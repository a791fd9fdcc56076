use crate::api::MarketData;
use crate::error::BotError;
use crate::indicators::LONGEST_LOOKBACK;
use crate::models::{Candle, RawCandle, Timeframe};
use crate::Result;

/// Ordered, gap-checked window of the most recent bars
///
/// Sorted ascending by open time with no duplicate open times. May hold
/// fewer than `limit` bars when the provider has less history.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleWindow {
    candles: Vec<Candle>,
    timeframe: Timeframe,
}

impl CandleWindow {
    /// Fetch the latest `limit` bars and validate them into a window
    pub async fn refresh(
        market: &dyn MarketData,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Self> {
        let raw = market.recent_candles(symbol, timeframe, limit).await?;

        if raw.is_empty() {
            return Err(BotError::DataUnavailable(format!(
                "no candles returned for {} ({})",
                symbol, timeframe
            )));
        }

        let candles = raw
            .iter()
            .map(validate_raw)
            .collect::<Result<Vec<_>>>()?;

        let window = Self::from_candles(candles, timeframe, limit)?;

        tracing::debug!(
            symbol = %symbol,
            "Candle window refreshed: {} bars, latest close {:?}",
            window.len(),
            window.latest().map(|c| c.close)
        );

        Ok(window)
    }

    /// Build a window from already-parsed bars: sort, dedupe (the later bar wins),
    /// keep the `limit` most recent and reject gaps.
    pub fn from_candles(mut candles: Vec<Candle>, timeframe: Timeframe, limit: usize) -> Result<Self> {
        candles.sort_by_key(|c| c.open_time);

        let mut deduped: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match deduped.last_mut() {
                Some(last) if last.open_time == candle.open_time => *last = candle,
                _ => deduped.push(candle),
            }
        }

        if deduped.len() > limit {
            deduped.drain(..deduped.len() - limit);
        }

        validate_gaps(&deduped, timeframe)?;

        Ok(Self {
            candles: deduped,
            timeframe,
        })
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Previous and latest bar, in that order
    pub fn latest_two(&self) -> Option<(&Candle, &Candle)> {
        match self.candles.as_slice() {
            [.., prev, last] => Some((prev, last)),
            _ => None,
        }
    }

    /// Enough bars for every indicator; a shorter window is not an error
    pub fn is_decision_ready(&self) -> bool {
        self.candles.len() >= LONGEST_LOOKBACK
    }
}

fn validate_raw(raw: &RawCandle) -> Result<Candle> {
    let field = |value: Option<rust_decimal::Decimal>, name: &str| {
        value.ok_or_else(|| {
            BotError::IncompleteData(format!("candle at {} has no {}", raw.open_time, name))
        })
    };

    let candle = Candle {
        open_time: raw.open_time,
        open: field(raw.open, "open")?,
        high: field(raw.high, "high")?,
        low: field(raw.low, "low")?,
        close: field(raw.close, "close")?,
        volume: field(raw.volume, "volume")?,
    };

    let prices = [candle.open, candle.high, candle.low, candle.close];
    if prices.iter().any(|p| p.is_sign_negative() || p.is_zero()) {
        return Err(BotError::IncompleteData(format!(
            "candle at {} has a non-positive price",
            candle.open_time
        )));
    }
    if candle.high < candle.low {
        return Err(BotError::IncompleteData(format!(
            "candle at {} has high {} below low {}",
            candle.open_time, candle.high, candle.low
        )));
    }

    Ok(candle)
}

/// Reject consecutive bars further apart than 1.5x the timeframe
fn validate_gaps(candles: &[Candle], timeframe: Timeframe) -> Result<()> {
    let interval = timeframe.duration();
    let max_gap = interval + interval / 2;

    for pair in candles.windows(2) {
        let gap = pair[1].open_time - pair[0].open_time;
        if gap > max_gap {
            return Err(BotError::IncompleteData(format!(
                "data gap of {}s between {} and {} (max allowed {}s)",
                gap.num_seconds(),
                pair[0].open_time.format("%Y-%m-%d %H:%M"),
                pair[1].open_time.format("%Y-%m-%d %H:%M"),
                max_gap.num_seconds()
            )));
        }
    }

    Ok(())
}
