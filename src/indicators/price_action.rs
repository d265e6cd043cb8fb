use crate::models::Candle;
use serde::{Deserialize, Serialize};

const WINDOW: usize = 10;
const HIGH_VOLATILITY_PCT: f64 = 5.0;
const MEDIUM_VOLATILITY_PCT: f64 = 2.0;
// Pullback tolerance for trend classification: the window may not stray
// more than 2% against the first close.
const TREND_TOLERANCE: f64 = 0.02;
const DOJI_BODY_RATIO: f64 = 0.3;
const SHADOW_DOMINANT_RATIO: f64 = 2.0;
const SHADOW_MINOR_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Sideways,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "uptrend",
            Trend::Down => "downtrend",
            Trend::Sideways => "sideways",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Volatility {
    High,
    Medium,
    Low,
}

impl Volatility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Volatility::High => "high",
            Volatility::Medium => "medium",
            Volatility::Low => "low",
        }
    }
}

/// Direction of a single candle body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandleDirection {
    Bullish,
    Bearish,
}

impl CandleDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleDirection::Bullish => "bullish",
            CandleDirection::Bearish => "bearish",
        }
    }

    fn of(candle: &Candle) -> CandleDirection {
        if candle.close > candle.open {
            CandleDirection::Bullish
        } else {
            CandleDirection::Bearish
        }
    }
}

/// Single-candle reversal patterns detected on the current candle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    Doji,
    Hammer,
    InvertedHammer,
}

impl Pattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::Doji => "doji",
            Pattern::Hammer => "hammer",
            Pattern::InvertedHammer => "inverted hammer",
        }
    }
}

/// Price-action classification over the last 10 candles of one timeframe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAction {
    pub trend: Trend,
    pub volatility: Volatility,
    /// High-to-low range of the window as a percentage of its low
    pub range_pct: f64,
    /// Average candle body size over the window, percent of open
    pub avg_body_pct: f64,
    pub current_direction: CandleDirection,
    pub patterns: Vec<Pattern>,
}

/// Classify trend, volatility and candle patterns
///
/// All figures come from the last 10 candles so stale history cannot
/// dominate a long input series. Trend is directional drift with a 2%
/// pullback tolerance: an uptrend needs the last close above the first
/// and no window close more than 2% below the first. Needs at least 3
/// candles; callers treat `None` as "unknown".
pub fn analyze_price_action(candles: &[Candle]) -> Option<PriceAction> {
    if candles.len() < 3 {
        return None;
    }

    let window = if candles.len() > WINDOW {
        &candles[candles.len() - WINDOW..]
    } else {
        candles
    };
    let current = window.last()?;

    let body_pcts: Vec<f64> = window
        .iter()
        .map(|c| (c.close - c.open).abs() / c.open * 100.0)
        .collect();
    let avg_body_pct = body_pcts.iter().sum::<f64>() / body_pcts.len() as f64;
    let current_direction = CandleDirection::of(current);

    let high = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let range_pct = if low > 0.0 {
        (high - low) / low * 100.0
    } else {
        0.0
    };

    let volatility = if range_pct > HIGH_VOLATILITY_PCT {
        Volatility::High
    } else if range_pct > MEDIUM_VOLATILITY_PCT {
        Volatility::Medium
    } else {
        Volatility::Low
    };

    let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
    let first_close = closes[0];
    let last_close = *closes.last()?;
    let min_close = closes.iter().copied().fold(f64::INFINITY, f64::min);
    let max_close = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let trend = if last_close > first_close && min_close > first_close * (1.0 - TREND_TOLERANCE) {
        Trend::Up
    } else if last_close < first_close && max_close < first_close * (1.0 + TREND_TOLERANCE) {
        Trend::Down
    } else {
        Trend::Sideways
    };

    Some(PriceAction {
        trend,
        volatility,
        range_pct,
        avg_body_pct,
        current_direction,
        patterns: detect_patterns(current, current_direction, *body_pcts.last()?, avg_body_pct),
    })
}

fn detect_patterns(
    current: &Candle,
    direction: CandleDirection,
    current_body_pct: f64,
    avg_body_pct: f64,
) -> Vec<Pattern> {
    let mut patterns = Vec::new();

    if current_body_pct < avg_body_pct * DOJI_BODY_RATIO {
        patterns.push(Pattern::Doji);
    }

    let body = (current.close - current.open).abs();
    // Which price bounds the shadows depends on the body's direction
    let (upper_shadow, lower_shadow) = match direction {
        CandleDirection::Bullish => (current.high - current.close, current.open - current.low),
        CandleDirection::Bearish => (current.high - current.open, current.close - current.low),
    };

    if lower_shadow > body * SHADOW_DOMINANT_RATIO && upper_shadow < body * SHADOW_MINOR_RATIO {
        patterns.push(Pattern::Hammer);
    } else if upper_shadow > body * SHADOW_DOMINANT_RATIO
        && lower_shadow < body * SHADOW_MINOR_RATIO
    {
        patterns.push(Pattern::InvertedHammer);
    }

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: Utc::now(),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_too_few_candles() {
        let candles = vec![candle(100.0, 101.0, 99.0, 100.5); 2];
        assert!(analyze_price_action(&candles).is_none());
    }

    #[test]
    fn test_gentle_drift_is_still_an_uptrend() {
        // +0.1% per candle, never dipping below the first close
        let candles: Vec<Candle> = (0..10)
            .map(|i| {
                let base = 100.0 + i as f64 * 0.1;
                candle(base, base + 0.15, base - 0.05, base + 0.1)
            })
            .collect();

        let pa = analyze_price_action(&candles).unwrap();
        assert_eq!(pa.trend, Trend::Up);
        assert_eq!(pa.current_direction, CandleDirection::Bullish);
    }

    #[test]
    fn test_deep_pullback_breaks_the_uptrend() {
        // Ends above the first close but dipped more than 2% mid-window
        let mut candles: Vec<Candle> = (0..5)
            .map(|_| candle(100.0, 100.5, 99.5, 100.0))
            .collect();
        candles.push(candle(100.0, 100.0, 96.0, 97.0));
        candles.extend((0..4).map(|i| {
            let base = 98.0 + i as f64;
            candle(base, base + 1.2, base - 0.2, base + 1.0)
        }));

        let pa = analyze_price_action(&candles).unwrap();
        assert_eq!(pa.trend, Trend::Sideways);
    }

    #[test]
    fn test_gentle_decline_is_a_downtrend() {
        let candles: Vec<Candle> = (0..10)
            .map(|i| {
                let base = 100.0 - i as f64 * 0.1;
                candle(base, base + 0.05, base - 0.15, base - 0.1)
            })
            .collect();

        let pa = analyze_price_action(&candles).unwrap();
        assert_eq!(pa.trend, Trend::Down);
        assert_eq!(pa.current_direction, CandleDirection::Bearish);
    }

    #[test]
    fn test_volatility_uses_recent_window() {
        // Wild swings long ago, calm last 10 candles
        let mut candles = vec![candle(100.0, 130.0, 70.0, 100.0); 20];
        candles.extend(std::iter::repeat(candle(100.0, 100.5, 99.5, 100.2)).take(10));

        let pa = analyze_price_action(&candles).unwrap();
        assert_eq!(pa.volatility, Volatility::Low);
    }

    #[test]
    fn test_high_volatility_range() {
        let mut candles = vec![candle(100.0, 101.0, 99.0, 100.0); 9];
        candles.push(candle(100.0, 107.0, 99.0, 101.0));
        let pa = analyze_price_action(&candles).unwrap();
        assert_eq!(pa.volatility, Volatility::High);
    }

    #[test]
    fn test_doji_relative_to_average_body() {
        // Bodies around 1% of open, then a 0.05% body: well under 0.3x avg
        let mut candles = vec![candle(100.0, 101.5, 99.5, 101.0); 9];
        candles.push(candle(100.0, 101.0, 99.0, 100.05));
        let pa = analyze_price_action(&candles).unwrap();
        assert!(pa.patterns.contains(&Pattern::Doji));
    }

    #[test]
    fn test_normal_body_is_not_a_doji() {
        let candles = vec![candle(100.0, 101.5, 99.5, 101.0); 10];
        let pa = analyze_price_action(&candles).unwrap();
        assert!(!pa.patterns.contains(&Pattern::Doji));
    }

    #[test]
    fn test_hammer_on_bullish_candle() {
        let mut candles = vec![candle(100.0, 101.5, 99.5, 101.0); 9];
        // Long lower shadow (3.0), tiny upper shadow (0.2), body 1.0
        candles.push(candle(100.0, 101.2, 97.0, 101.0));
        let pa = analyze_price_action(&candles).unwrap();
        assert!(pa.patterns.contains(&Pattern::Hammer));
    }

    #[test]
    fn test_inverted_hammer_on_bearish_candle() {
        let mut candles = vec![candle(100.0, 101.5, 99.5, 101.0); 9];
        // Bearish body 1.0, upper shadow 3.0 above the open, lower 0.2
        candles.push(candle(101.0, 104.0, 99.8, 100.0));
        let pa = analyze_price_action(&candles).unwrap();
        assert_eq!(pa.current_direction, CandleDirection::Bearish);
        assert!(pa.patterns.contains(&Pattern::InvertedHammer));
    }
}
