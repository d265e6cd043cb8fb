// Technical indicators module
// Implements SMA, EMA, RSI, MACD, Bollinger Bands plus price-action
// and volume analysis for the market snapshot

pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod price_action;
pub mod rsi;
pub mod snapshot;
pub mod volume;

pub use bollinger::calculate_bollinger;
pub use macd::calculate_macd;
pub use moving_average::{calculate_ema, calculate_sma};
pub use price_action::{
    analyze_price_action, CandleDirection, Pattern, PriceAction, Trend, Volatility,
};
pub use rsi::calculate_rsi;
pub use snapshot::{BollingerPosition, IndicatorSnapshot, RsiZone, SmaTrend};
pub use volume::{analyze_volume, TrendConfirmation, VolumeAnalysis};
