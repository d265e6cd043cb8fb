use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

use crate::api::{BinanceClient, NewsClient};
use crate::cache::TtlCache;
use crate::config::Settings;
use crate::error::BotError;
use crate::indicators::{
    analyze_price_action, analyze_volume, IndicatorSnapshot, PriceAction, VolumeAnalysis,
};
use crate::models::{Candle, NewsItem, Timeframe};

/// Everything the decision provider sees about the market at one instant
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub timestamp: DateTime<Utc>,
    pub current_price: f64,
    pub indicators: HashMap<Timeframe, IndicatorSnapshot>,
    pub price_action: HashMap<Timeframe, PriceAction>,
    pub volume: HashMap<Timeframe, VolumeAnalysis>,
    pub news: Vec<NewsItem>,
}

/// Fetches market data through TTL caches and assembles snapshots
///
/// Upstream failures degrade to the last cached value where one exists;
/// a timeframe with neither fresh nor stale data is omitted from the
/// snapshot rather than failing the whole cycle.
pub struct MarketDataCollector {
    api: BinanceClient,
    news_client: Option<NewsClient>,
    symbol: String,
    price_ttl: Duration,
    news_ttl: Duration,
    candle_ttls: HashMap<Timeframe, Duration>,
    price_cache: TtlCache<String, f64>,
    candle_cache: TtlCache<Timeframe, Vec<Candle>>,
    news_cache: TtlCache<String, Vec<NewsItem>>,
}

impl MarketDataCollector {
    pub fn new(api: BinanceClient, news_client: Option<NewsClient>, settings: &Settings) -> Self {
        let candle_ttls = Timeframe::ALL
            .iter()
            .map(|&tf| (tf, Duration::from_secs(settings.candle_cache_ttl_secs(tf))))
            .collect();

        Self {
            api,
            news_client,
            symbol: settings.symbol.clone(),
            price_ttl: Duration::from_secs(settings.price_cache_ttl_secs),
            news_ttl: Duration::from_secs(settings.news_cache_ttl_secs),
            candle_ttls,
            price_cache: TtlCache::new(),
            candle_cache: TtlCache::new(),
            news_cache: TtlCache::new(),
        }
    }

    /// Current price, served from cache within its TTL
    pub async fn current_price(&mut self) -> Result<f64, BotError> {
        if let Some(&price) = self.price_cache.get(&self.symbol) {
            return Ok(price);
        }

        match self.api.ticker_price(&self.symbol).await {
            Ok(price) => {
                self.price_cache
                    .insert(self.symbol.clone(), price, self.price_ttl);
                Ok(price)
            }
            Err(e) => {
                if let Some(&stale) = self.price_cache.get_stale(&self.symbol) {
                    tracing::warn!("Price fetch failed ({}), using stale cache", e);
                    Ok(stale)
                } else {
                    Err(BotError::Io(e))
                }
            }
        }
    }

    /// Candles for one timeframe, cached per the timeframe's TTL
    pub async fn candles(&mut self, timeframe: Timeframe) -> Result<Vec<Candle>, BotError> {
        if let Some(candles) = self.candle_cache.get(&timeframe) {
            return Ok(candles.clone());
        }

        let ttl = self
            .candle_ttls
            .get(&timeframe)
            .copied()
            .unwrap_or(Duration::from_secs(600));

        match self
            .api
            .klines(&self.symbol, timeframe, timeframe.candle_limit())
            .await
        {
            Ok(candles) => {
                self.candle_cache.insert(timeframe, candles.clone(), ttl);
                Ok(candles)
            }
            Err(e) => {
                if let Some(stale) = self.candle_cache.get_stale(&timeframe) {
                    tracing::warn!(
                        "Candle fetch for {} failed ({}), using stale cache",
                        timeframe,
                        e
                    );
                    Ok(stale.clone())
                } else {
                    Err(BotError::Io(e))
                }
            }
        }
    }

    /// Latest headlines; an absent or failing news client yields none
    pub async fn news(&mut self) -> Vec<NewsItem> {
        let Some(client) = &self.news_client else {
            return Vec::new();
        };

        let key = "bitcoin".to_string();
        if let Some(items) = self.news_cache.get(&key) {
            return items.clone();
        }

        match client.latest_headlines().await {
            Ok(items) => {
                self.news_cache.insert(key, items.clone(), self.news_ttl);
                items
            }
            Err(e) => {
                tracing::warn!("News fetch failed: {}", e);
                self.news_cache
                    .get_stale(&key)
                    .cloned()
                    .unwrap_or_default()
            }
        }
    }

    /// Assemble a full snapshot across all timeframes
    ///
    /// Fails only when the current price is unavailable or no timeframe
    /// produced an indicator set.
    pub async fn snapshot(&mut self) -> Result<MarketSnapshot, BotError> {
        let current_price = self.current_price().await?;

        let mut indicators = HashMap::new();
        let mut price_action = HashMap::new();
        let mut volume = HashMap::new();

        for timeframe in Timeframe::ALL {
            let candles = match self.candles(timeframe).await {
                Ok(candles) => candles,
                Err(e) => {
                    tracing::warn!("Skipping {} timeframe: {}", timeframe, e);
                    continue;
                }
            };

            match IndicatorSnapshot::compute(&candles) {
                Some(snapshot) => {
                    indicators.insert(timeframe, snapshot);
                }
                None => {
                    tracing::warn!(
                        "Skipping {} timeframe: only {} candles",
                        timeframe,
                        candles.len()
                    );
                    continue;
                }
            }

            if let Some(pa) = analyze_price_action(&candles) {
                price_action.insert(timeframe, pa);
            }
            volume.insert(timeframe, analyze_volume(&candles));
        }

        if indicators.is_empty() {
            return Err(BotError::InsufficientData(
                "no timeframe produced indicators".to_string(),
            ));
        }

        Ok(MarketSnapshot {
            timestamp: Utc::now(),
            current_price,
            indicators,
            price_action,
            volume,
            news: self.news().await,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> Settings {
        // Touch nothing global; defaults are what production uses
        Settings::load().unwrap()
    }

    fn collector_for(server_url: &str, settings: &Settings) -> MarketDataCollector {
        let api = BinanceClient::with_base_url(
            "key".to_string(),
            "secret".to_string(),
            1,
            server_url,
        )
        .unwrap();
        MarketDataCollector::new(api, None, settings)
    }

    fn klines_body(count: usize) -> String {
        let rows: Vec<String> = (0..count)
            .map(|i| {
                format!(
                    r#"[{}, "50000", "50500", "49800", "50200", "120", {}, "0", 10, "0", "0", "0"]"#,
                    1700000000000i64 + i as i64 * 3600000,
                    1700000000000i64 + (i as i64 + 1) * 3600000 - 1
                )
            })
            .collect();
        format!("[{}]", rows.join(","))
    }

    #[tokio::test]
    async fn test_price_is_cached_within_ttl() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/fapi/v1/ticker/price?symbol=BTCUSDT")
            .with_status(200)
            .with_body(r#"{"symbol": "BTCUSDT", "price": "50000.0"}"#)
            .expect(1)
            .create_async()
            .await;

        let settings = test_settings();
        let mut collector = collector_for(&server.url(), &settings);

        assert_eq!(collector.current_price().await.unwrap(), 50000.0);
        // Second read must come from cache, not a second request
        assert_eq!(collector.current_price().await.unwrap(), 50000.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_price_degrades_to_stale_cache() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/ticker/price?symbol=BTCUSDT")
            .with_status(200)
            .with_body(r#"{"symbol": "BTCUSDT", "price": "50000.0"}"#)
            .expect(1)
            .create_async()
            .await;

        let mut settings = test_settings();
        settings.price_cache_ttl_secs = 0; // every read goes upstream
        let mut collector = collector_for(&server.url(), &settings);

        assert_eq!(collector.current_price().await.unwrap(), 50000.0);

        // Upstream now fails; the stale value is still served
        server.reset_async().await;
        server
            .mock("GET", "/fapi/v1/ticker/price?symbol=BTCUSDT")
            .with_status(500)
            .create_async()
            .await;

        assert_eq!(collector.current_price().await.unwrap(), 50000.0);
    }

    #[tokio::test]
    async fn test_price_error_without_cache_propagates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/ticker/price?symbol=BTCUSDT")
            .with_status(500)
            .create_async()
            .await;

        let settings = test_settings();
        let mut collector = collector_for(&server.url(), &settings);

        assert!(matches!(
            collector.current_price().await,
            Err(BotError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_omits_short_timeframes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/ticker/price?symbol=BTCUSDT")
            .with_status(200)
            .with_body(r#"{"symbol": "BTCUSDT", "price": "50200.0"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/fapi/v1/klines?symbol=BTCUSDT&interval=15m&limit=96")
            .with_status(200)
            .with_body(klines_body(96))
            .create_async()
            .await;
        server
            .mock("GET", "/fapi/v1/klines?symbol=BTCUSDT&interval=1h&limit=72")
            .with_status(200)
            .with_body(klines_body(10)) // below the 21-candle minimum
            .create_async()
            .await;
        server
            .mock("GET", "/fapi/v1/klines?symbol=BTCUSDT&interval=4h&limit=42")
            .with_status(500)
            .create_async()
            .await;

        let settings = test_settings();
        let mut collector = collector_for(&server.url(), &settings);
        let snapshot = collector.snapshot().await.unwrap();

        assert_eq!(snapshot.current_price, 50200.0);
        assert!(snapshot.indicators.contains_key(&Timeframe::M15));
        assert!(!snapshot.indicators.contains_key(&Timeframe::H1));
        assert!(!snapshot.indicators.contains_key(&Timeframe::H4));
        assert!(snapshot.volume.contains_key(&Timeframe::M15));
        assert!(snapshot.news.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_fails_when_nothing_usable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/ticker/price?symbol=BTCUSDT")
            .with_status(200)
            .with_body(r#"{"symbol": "BTCUSDT", "price": "50200.0"}"#)
            .create_async()
            .await;
        for (interval, limit) in [("15m", 96), ("1h", 72), ("4h", 42)] {
            server
                .mock(
                    "GET",
                    format!(
                        "/fapi/v1/klines?symbol=BTCUSDT&interval={}&limit={}",
                        interval, limit
                    )
                    .as_str(),
                )
                .with_status(500)
                .create_async()
                .await;
        }

        let settings = test_settings();
        let mut collector = collector_for(&server.url(), &settings);

        assert!(matches!(
            collector.snapshot().await,
            Err(BotError::InsufficientData(_))
        ));
    }
}
