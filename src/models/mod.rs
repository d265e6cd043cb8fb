use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candlestick data for a single symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candle timeframes used for analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M15,
    H1,
    H4,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::M15, Timeframe::H1, Timeframe::H4];

    /// Interval string as Binance expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
        }
    }

    /// How many candles to fetch per timeframe (24h for 15m, 3d for 1h, 1w for 4h)
    pub fn candle_limit(&self) -> usize {
        match self {
            Timeframe::M15 => 96,
            Timeframe::H1 => 72,
            Timeframe::H4 => 42,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
    NoPosition,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
            Direction::NoPosition => "NO_POSITION",
        }
    }

    pub fn from_str_lossy(s: &str) -> Direction {
        match s.trim().to_uppercase().as_str() {
            "LONG" => Direction::Long,
            "SHORT" => Direction::Short,
            _ => Direction::NoPosition,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Open,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "OPEN",
            TradeStatus::Closed => "CLOSED",
        }
    }
}

/// A single futures trade, persisted across the open/close lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    /// Position size in base asset (BTC)
    pub amount: f64,
    /// Quote currency (USDT) committed at entry
    pub investment_amount: f64,
    pub leverage: u32,
    pub sl_price: f64,
    pub tp_price: f64,
    pub sl_pct: f64,
    pub tp_pct: f64,
    /// Fraction of available balance committed at entry
    pub position_size_pct: f64,
    pub status: TradeStatus,
    pub profit_loss: Option<f64>,
    pub profit_loss_pct: Option<f64>,
    pub exit_reason: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Trade {
    /// Leveraged P&L percentage at the given exit price
    pub fn pnl_pct_at(&self, exit_price: f64) -> f64 {
        let raw = match self.direction {
            Direction::Short => (self.entry_price - exit_price) / self.entry_price,
            _ => (exit_price - self.entry_price) / self.entry_price,
        };
        raw * 100.0 * self.leverage as f64
    }

    /// P&L in quote currency (USDT) at the given exit price
    pub fn pnl_at(&self, exit_price: f64) -> f64 {
        self.entry_price * self.amount * self.pnl_pct_at(exit_price) / 100.0
    }
}

/// A validated trading decision, produced by the decision provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub direction: Direction,
    /// Fraction of balance to commit, in [0.1, 1.0]
    pub position_size_pct: f64,
    /// Leverage multiplier, in [1, 5]
    pub leverage: u32,
    /// Stop-loss distance from entry in percent, in [0.5, 10.0]
    pub sl_pct: f64,
    /// Take-profit distance from entry in percent, in [1.0, 20.0]
    pub tp_pct: f64,
    pub reasoning: String,
}

/// A news headline included in the market context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub source: String,
    pub published: Option<String>,
}
