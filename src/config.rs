use anyhow::{Context, Result};
use serde::Deserialize;

/// Operating parameters, loaded from environment with sane defaults.
///
/// Every field can be overridden with a `BOT_`-prefixed environment
/// variable, e.g. `BOT_ANALYSIS_INTERVAL_SECS=120`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub symbol: String,
    pub analysis_interval_secs: u64,
    pub price_poll_interval_secs: u64,
    pub position_check_interval_secs: u64,
    pub cache_ttl_15m_secs: u64,
    pub cache_ttl_1h_secs: u64,
    pub cache_ttl_4h_secs: u64,
    pub price_cache_ttl_secs: u64,
    pub news_cache_ttl_secs: u64,
    pub max_api_retries: u32,
    pub dry_run: bool,
    pub sim_capital: f64,
    pub min_order_amount: f64,
    pub max_reasoning_length: usize,
    pub database_url: String,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let cfg = config::Config::builder()
            .set_default("symbol", "BTCUSDT")?
            .set_default("analysis_interval_secs", 60u64)?
            .set_default("price_poll_interval_secs", 10u64)?
            .set_default("position_check_interval_secs", 5u64)?
            .set_default("cache_ttl_15m_secs", 600u64)?
            .set_default("cache_ttl_1h_secs", 1800u64)?
            .set_default("cache_ttl_4h_secs", 3600u64)?
            .set_default("price_cache_ttl_secs", 5u64)?
            .set_default("news_cache_ttl_secs", 3600u64)?
            .set_default("max_api_retries", 3u32)?
            .set_default("dry_run", true)?
            .set_default("sim_capital", 10000.0)?
            .set_default("min_order_amount", 100.0)?
            .set_default("max_reasoning_length", 1000u64)?
            .set_default("database_url", "sqlite://btcbot.db")?
            .add_source(config::Environment::with_prefix("BOT"))
            .build()
            .context("Failed to build configuration")?;

        cfg.try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Candle cache TTL for a timeframe, in seconds
    pub fn candle_cache_ttl_secs(&self, timeframe: crate::models::Timeframe) -> u64 {
        match timeframe {
            crate::models::Timeframe::M15 => self.cache_ttl_15m_secs,
            crate::models::Timeframe::H1 => self.cache_ttl_1h_secs,
            crate::models::Timeframe::H4 => self.cache_ttl_4h_secs,
        }
    }
}

/// API credentials, read directly from the environment (never from defaults)
#[derive(Debug, Clone)]
pub struct Credentials {
    pub binance_api_key: Option<String>,
    pub binance_secret_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: Option<String>,
    pub serp_api_key: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            binance_api_key: std::env::var("BINANCE_API_KEY").ok(),
            binance_secret_key: std::env::var("BINANCE_SECRET_KEY").ok(),
            openrouter_api_key: std::env::var("OPENROUTER_API_KEY").ok(),
            openrouter_model: std::env::var("OPENROUTER_MODEL").ok(),
            serp_api_key: std::env::var("SERP_API_KEY").ok(),
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            telegram_chat_id: std::env::var("TELEGRAM_CHAT_ID").ok(),
        }
    }
}
