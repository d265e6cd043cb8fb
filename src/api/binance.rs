use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::models::{Candle, Timeframe};

const BINANCE_FUTURES_BASE: &str = "https://fapi.binance.com";
const RATE_LIMIT_RPM: u32 = 1200; // Futures REST weight limit is generous; stay well under it
const RETRY_DELAY_SECS: u64 = 2;

type HmacSha256 = Hmac<Sha256>;

// Type alias for the rate limiter to simplify signatures
type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Binance USDT-M futures REST client
///
/// Public market-data endpoints need no credentials; order placement,
/// leverage changes and balance reads are HMAC-signed.
#[derive(Clone)]
pub struct BinanceClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    secret_key: String,
    rate_limiter: Arc<BinanceRateLimiter>,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    asset: String,
    #[serde(rename = "availableBalance")]
    available_balance: String,
}

impl BinanceClient {
    pub fn new(api_key: String, secret_key: String, max_retries: u32) -> Result<Self> {
        Self::with_base_url(api_key, secret_key, max_retries, BINANCE_FUTURES_BASE)
    }

    /// Build a client against a different base URL (used by HTTP tests)
    pub fn with_base_url(
        api_key: String,
        secret_key: String,
        max_retries: u32,
        base_url: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        let quota = Quota::per_minute(
            NonZeroU32::new(RATE_LIMIT_RPM).context("rate limit must be non-zero")?,
        );

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            secret_key,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            max_retries: max_retries.max(1),
        })
    }

    /// Latest mark price for a symbol
    pub async fn ticker_price(&self, symbol: &str) -> Result<f64> {
        let url = format!(
            "{}/fapi/v1/ticker/price?symbol={}",
            self.base_url, symbol
        );
        let response = self.make_request(&url).await?;

        let ticker: TickerPrice = response.json().await.context("Failed to parse ticker")?;
        ticker
            .price
            .parse::<f64>()
            .context("Ticker price is not a number")
    }

    /// Fetch OHLCV candles for a symbol and timeframe
    pub async fn klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/fapi/v1/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol,
            timeframe.as_str(),
            limit
        );
        let response = self.make_request(&url).await?;

        let rows: Vec<Vec<serde_json::Value>> =
            response.json().await.context("Failed to parse klines")?;

        rows.iter().map(|row| parse_kline_row(row)).collect()
    }

    /// Set leverage for a symbol (signed)
    pub async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        let query = format!(
            "symbol={}&leverage={}&timestamp={}",
            symbol,
            leverage,
            Utc::now().timestamp_millis()
        );
        self.signed_post("/fapi/v1/leverage", &query).await?;
        Ok(())
    }

    /// Place a market order (signed)
    ///
    /// `side` is BUY or SELL; `quantity` is in the base asset.
    pub async fn place_market_order(&self, symbol: &str, side: &str, quantity: f64) -> Result<()> {
        let query = format!(
            "symbol={}&side={}&type=MARKET&quantity={:.3}&timestamp={}",
            symbol,
            side,
            quantity,
            Utc::now().timestamp_millis()
        );
        self.signed_post("/fapi/v1/order", &query).await?;
        Ok(())
    }

    /// Available USDT balance on the futures account (signed)
    pub async fn available_balance(&self) -> Result<f64> {
        let query = format!("timestamp={}", Utc::now().timestamp_millis());
        let signature = self.sign(&query)?;
        let url = format!(
            "{}/fapi/v2/balance?{}&signature={}",
            self.base_url, query, signature
        );

        self.rate_limiter.until_ready().await;
        let response = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .context("Balance request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance balance error ({}): {}", status, body);
        }

        let balances: Vec<AccountBalance> =
            response.json().await.context("Failed to parse balances")?;

        let usdt = balances
            .iter()
            .find(|b| b.asset == "USDT")
            .context("No USDT balance entry")?;

        usdt.available_balance
            .parse::<f64>()
            .context("Balance is not a number")
    }

    /// Make a rate-limited GET request with bounded retries
    ///
    /// Retries on network errors, 429 and 5xx with a fixed delay between
    /// attempts; other client errors fail immediately.
    async fn make_request(&self, url: &str) -> Result<reqwest::Response> {
        for attempt in 1..=self.max_retries {
            self.rate_limiter.until_ready().await;

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(
                            "Binance error {} on {}, retrying in {}s (attempt {}/{})",
                            status,
                            url,
                            RETRY_DELAY_SECS,
                            attempt,
                            self.max_retries
                        );
                        tokio::time::sleep(std::time::Duration::from_secs(RETRY_DELAY_SECS)).await;
                        continue;
                    }

                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    anyhow::bail!("Binance API error ({}): {}", status, error_text);
                }
                Err(e) if attempt < self.max_retries => {
                    tracing::warn!(
                        "Network error: {}, retrying in {}s (attempt {}/{})",
                        e,
                        RETRY_DELAY_SECS,
                        attempt,
                        self.max_retries
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(RETRY_DELAY_SECS)).await;
                }
                Err(e) => anyhow::bail!("Network error after {} retries: {}", self.max_retries, e),
            }
        }

        anyhow::bail!("Failed after {} retries", self.max_retries)
    }

    async fn signed_post(&self, path: &str, query: &str) -> Result<reqwest::Response> {
        let signature = self.sign(query)?;
        let url = format!(
            "{}{}?{}&signature={}",
            self.base_url, path, query, signature
        );

        self.rate_limiter.until_ready().await;
        let response = self
            .client
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .with_context(|| format!("Signed request to {} failed", path))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error ({}) on {}: {}", status, path, body);
        }

        Ok(response)
    }

    fn sign(&self, query: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .context("Invalid secret key")?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

fn parse_kline_row(row: &[serde_json::Value]) -> Result<Candle> {
    let open_time = row
        .first()
        .and_then(|v| v.as_i64())
        .context("Kline row missing open time")?;
    let timestamp: DateTime<Utc> =
        DateTime::from_timestamp_millis(open_time).context("Kline open time out of range")?;

    let field = |index: usize| -> Result<f64> {
        row.get(index)
            .and_then(|v| v.as_str())
            .with_context(|| format!("Kline row missing field {}", index))?
            .parse::<f64>()
            .with_context(|| format!("Kline field {} is not a number", index))
    };

    Ok(Candle {
        timestamp,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
    })
}
