use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;

use super::{Fill, MarketData, OrderAmount, TrackedAssets, Venue};
use crate::error::BotError;
use crate::models::{Balances, RawCandle, Side, Timeframe};
use crate::Result;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const REQUESTS_PER_MINUTE: u32 = 600;
const RECV_WINDOW_MS: u64 = 5000;

type HmacSha256 = Hmac<Sha256>;

type SpotRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Clone)]
struct Credentials {
    api_key: String,
    api_secret: String,
}

/// Spot exchange REST client (Binance-compatible API)
///
/// Serves both market data (public endpoints) and order placement (signed
/// endpoints). Clones share one rate limiter.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    rate_limiter: Arc<SpotRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
struct AssetBalance {
    asset: String,
    free: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    client_order_id: String,
    executed_qty: String,
    cummulative_quote_qty: String,
    status: String,
}

impl BinanceClient {
    /// Create a client with a request-level timeout
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BotError::Config(format!("failed to build HTTP client: {}", e)))?;

        let quota = Quota::per_minute(NonZeroU32::new(REQUESTS_PER_MINUTE).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// Attach API credentials for the signed account/order endpoints
    pub fn with_credentials(mut self, api_key: String, api_secret: String) -> Self {
        self.credentials = Some(Credentials {
            api_key,
            api_secret,
        });
        self
    }

    fn credentials(&self) -> Result<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| BotError::Config("API credentials are required for signed endpoints".into()))
    }

    /// Wait for a rate-limit slot, then build the signed URL and return it with the API key
    ///
    /// Signing happens after the wait so the timestamp stays inside `recvWindow`.
    async fn signed_url(&self, path: &str, params: &str) -> Result<(String, String)> {
        let credentials = self.credentials()?.clone();

        self.rate_limiter.until_ready().await;

        let timestamp = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("timestamp={}&recvWindow={}", timestamp, RECV_WINDOW_MS)
        } else {
            format!("{}&timestamp={}&recvWindow={}", params, timestamp, RECV_WINDOW_MS)
        };
        let signature = sign(&credentials.api_secret, &query)?;
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);
        Ok((url, credentials.api_key))
    }

    async fn public_get(&self, path_and_query: &str) -> Result<reqwest::Response> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path_and_query);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BotError::DataUnavailable(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::DataUnavailable(format!(
                "{} returned {}: {}",
                url, status, body
            )));
        }

        Ok(response)
    }
}

/// Hex-encoded HMAC-SHA256 of `payload`
pub fn sign(secret: &str, payload: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BotError::Config(format!("invalid API secret: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn parse_decimal(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(s) => Decimal::from_str(s).ok(),
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

fn parse_kline(row: &[serde_json::Value]) -> Result<RawCandle> {
    let open_ms = row
        .first()
        .and_then(|v| v.as_i64())
        .ok_or_else(|| BotError::DataUnavailable("kline without open time".into()))?;
    let open_time = Utc
        .timestamp_millis_opt(open_ms)
        .single()
        .ok_or_else(|| BotError::DataUnavailable(format!("invalid kline open time {}", open_ms)))?;

    let field = |i: usize| row.get(i).and_then(parse_decimal);

    Ok(RawCandle {
        open_time,
        open: field(1),
        high: field(2),
        low: field(3),
        close: field(4),
        volume: field(5),
    })
}

fn side_param(side: Side) -> &'static str {
    match side {
        Side::Buy => "BUY",
        Side::Sell => "SELL",
    }
}

#[async_trait]
impl MarketData for BinanceClient {
    async fn recent_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<RawCandle>> {
        let path = format!(
            "/api/v3/klines?symbol={}&interval={}&limit={}",
            symbol, timeframe, count
        );
        let response = self.public_get(&path).await?;

        let rows: Vec<Vec<serde_json::Value>> = response
            .json()
            .await
            .map_err(|e| BotError::DataUnavailable(format!("failed to parse klines: {}", e)))?;

        let candles = rows
            .iter()
            .map(|row| parse_kline(row))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("Fetched {} klines for {} ({})", candles.len(), symbol, timeframe);

        Ok(candles)
    }

    async fn last_price(&self, symbol: &str) -> Result<Decimal> {
        let path = format!("/api/v3/ticker/price?symbol={}", symbol);
        let response = self.public_get(&path).await?;

        let ticker: TickerPrice = response
            .json()
            .await
            .map_err(|e| BotError::DataUnavailable(format!("failed to parse ticker: {}", e)))?;

        Decimal::from_str(&ticker.price).map_err(|e| {
            BotError::DataUnavailable(format!("invalid price '{}': {}", ticker.price, e))
        })
    }
}

#[async_trait]
impl Venue for BinanceClient {
    async fn get_balances(&self, assets: &TrackedAssets) -> Result<Balances> {
        let (url, api_key) = self.signed_url("/api/v3/account", "").await?;
        let response = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", api_key)
            .send()
            .await
            .map_err(|e| BotError::DataUnavailable(format!("account request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::DataUnavailable(format!(
                "account endpoint returned {}: {}",
                status, body
            )));
        }

        let account: AccountResponse = response
            .json()
            .await
            .map_err(|e| BotError::DataUnavailable(format!("failed to parse account: {}", e)))?;

        let free = |asset: &str| -> Decimal {
            account
                .balances
                .iter()
                .find(|b| b.asset == asset)
                .and_then(|b| Decimal::from_str(&b.free).ok())
                .unwrap_or(Decimal::ZERO)
        };

        Ok(Balances {
            base_qty: free(&assets.base),
            quote_qty: free(&assets.quote),
            reserve_qty: free(&assets.reserve),
        })
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        amount: OrderAmount,
        idempotency_key: &str,
    ) -> Result<Fill> {
        let amount_param = match amount {
            OrderAmount::Quote(q) => format!("quoteOrderQty={}", q.normalize()),
            OrderAmount::Base(q) => format!("quantity={}", q.normalize()),
        };
        let params = format!(
            "symbol={}&side={}&type=MARKET&{}&newClientOrderId={}&newOrderRespType=RESULT",
            symbol,
            side_param(side),
            amount_param,
            idempotency_key
        );
        let (url, api_key) = self.signed_url("/api/v3/order", &params).await?;

        tracing::info!(
            symbol = %symbol,
            client_order_id = %idempotency_key,
            "Submitting {} market order ({:?})",
            side,
            amount
        );

        let response = match self
            .client
            .post(&url)
            .header("X-MBX-APIKEY", api_key)
            .send()
            .await
        {
            Ok(r) => r,
            // Nothing reached the venue
            Err(e) if e.is_connect() => {
                return Err(BotError::OrderRejected(format!("order not submitted: {}", e)))
            }
            Err(e) => {
                return Err(BotError::Ambiguous {
                    client_order_id: idempotency_key.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let status = response.status();
        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Ambiguous {
                client_order_id: idempotency_key.to_string(),
                reason: format!("venue returned {}: {}", status, body),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::OrderRejected(format!("{}: {}", status, body)));
        }

        let order: OrderResponse = response.json().await.map_err(|e| BotError::Ambiguous {
            client_order_id: idempotency_key.to_string(),
            reason: format!("unreadable order response: {}", e),
        })?;

        let executed_qty = Decimal::from_str(&order.executed_qty).unwrap_or(Decimal::ZERO);
        let quote_qty = Decimal::from_str(&order.cummulative_quote_qty).unwrap_or(Decimal::ZERO);

        if executed_qty.is_zero() && matches!(order.status.as_str(), "EXPIRED" | "REJECTED" | "CANCELED")
        {
            return Err(BotError::OrderRejected(format!(
                "order {} ended {} without a fill",
                order.client_order_id, order.status
            )));
        }

        Ok(Fill {
            client_order_id: order.client_order_id,
            executed_qty,
            quote_qty,
        })
    }
}
