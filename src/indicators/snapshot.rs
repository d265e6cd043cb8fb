use crate::indicators::{calculate_bollinger, calculate_macd, calculate_rsi, calculate_sma};
use crate::models::Candle;
use serde::{Deserialize, Serialize};

const MIN_CANDLES: usize = 21;
const RSI_PERIOD: usize = 14;
const BOLLINGER_PERIOD: usize = 20;
const BOLLINGER_WIDTH: f64 = 2.0;
const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;

/// Fast-vs-slow SMA cross, bullish when SMA7 is above SMA21
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmaTrend {
    Bullish,
    Bearish,
}

impl SmaTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmaTrend::Bullish => "bullish",
            SmaTrend::Bearish => "bearish",
        }
    }
}

/// Where the current close sits relative to the Bollinger bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BollingerPosition {
    Upper,
    Middle,
    Lower,
}

impl BollingerPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            BollingerPosition::Upper => "above the upper band",
            BollingerPosition::Middle => "inside the bands",
            BollingerPosition::Lower => "below the lower band",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiZone {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            RsiZone::Overbought => "overbought",
            RsiZone::Oversold => "oversold",
            RsiZone::Neutral => "neutral",
        }
    }
}

/// Computed indicator values for one timeframe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub sma_7: f64,
    pub sma_21: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub sma_trend: SmaTrend,
    pub bollinger_position: BollingerPosition,
    pub rsi_zone: RsiZone,
}

impl IndicatorSnapshot {
    /// Compute all indicators from a candle series
    ///
    /// Returns `None` with fewer than 21 candles. Indicators that need a
    /// longer series than provided fall back to neutral values: RSI to
    /// 50, MACD to zero, Bollinger bands to the last close.
    pub fn compute(candles: &[Candle]) -> Option<IndicatorSnapshot> {
        if candles.len() < MIN_CANDLES {
            return None;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let last_close = *closes.last()?;

        let sma_7 = calculate_sma(&closes, 7).unwrap_or(last_close);
        let sma_21 = calculate_sma(&closes, 21).unwrap_or(last_close);
        let rsi = calculate_rsi(&closes, RSI_PERIOD).unwrap_or(50.0);
        let (macd, macd_signal, macd_histogram) =
            calculate_macd(&closes).unwrap_or((0.0, 0.0, 0.0));
        let (bb_upper, bb_middle, bb_lower) =
            calculate_bollinger(&closes, BOLLINGER_PERIOD, BOLLINGER_WIDTH)
                .unwrap_or((last_close, last_close, last_close));

        let sma_trend = if sma_7 > sma_21 {
            SmaTrend::Bullish
        } else {
            SmaTrend::Bearish
        };
        let bollinger_position = if last_close > bb_upper {
            BollingerPosition::Upper
        } else if last_close < bb_lower {
            BollingerPosition::Lower
        } else {
            BollingerPosition::Middle
        };
        let rsi_zone = if rsi > RSI_OVERBOUGHT {
            RsiZone::Overbought
        } else if rsi < RSI_OVERSOLD {
            RsiZone::Oversold
        } else {
            RsiZone::Neutral
        };

        Some(IndicatorSnapshot {
            sma_7,
            sma_21,
            rsi,
            macd,
            macd_signal,
            macd_histogram,
            bb_upper,
            bb_middle,
            bb_lower,
            sma_trend,
            bollinger_position,
            rsi_zone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .map(|&close| Candle {
                timestamp: Utc::now(),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_below_minimum_candles() {
        let candles = candles_from_closes(&[100.0; 20]);
        assert!(IndicatorSnapshot::compute(&candles).is_none());
    }

    #[test]
    fn test_flat_series_smas_collapse_to_the_close() {
        let candles = candles_from_closes(&[50000.0; 60]);
        let snapshot = IndicatorSnapshot::compute(&candles).unwrap();

        assert_eq!(snapshot.sma_7, 50000.0);
        assert_eq!(snapshot.sma_21, 50000.0);
        assert_eq!(snapshot.sma_7, snapshot.sma_21);
        assert_eq!(snapshot.sma_trend, SmaTrend::Bearish); // not strictly above
        assert_eq!(snapshot.bollinger_position, BollingerPosition::Middle);
        assert!(snapshot.macd_histogram.abs() < 1e-9);
        assert_eq!(snapshot.bb_upper, 50000.0);
        assert_eq!(snapshot.bb_lower, 50000.0);
    }

    #[test]
    fn test_short_series_falls_back_for_macd() {
        // 21 candles: enough for the snapshot, too few for MACD(12,26,9)
        let closes: Vec<f64> = (0..21).map(|i| 100.0 + i as f64).collect();
        let snapshot = IndicatorSnapshot::compute(&candles_from_closes(&closes)).unwrap();

        assert!(snapshot.macd.abs() < 1e-9);
        assert!(snapshot.macd_signal.abs() < 1e-9);
        assert!(snapshot.rsi > 99.0); // monotone uptrend
        assert_eq!(snapshot.rsi_zone, RsiZone::Overbought);
    }

    #[test]
    fn test_uptrend_classifications() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
        let snapshot = IndicatorSnapshot::compute(&candles_from_closes(&closes)).unwrap();

        // The 7-candle average sits closer to the latest price than the
        // 21-candle one in a rising market
        assert!(snapshot.sma_7 > snapshot.sma_21);
        assert_eq!(snapshot.sma_trend, SmaTrend::Bullish);
        assert!(snapshot.macd > 0.0);
        assert!(snapshot.bb_upper > snapshot.bb_lower);
    }

    #[test]
    fn test_close_above_the_upper_band() {
        // Flat series with a final jump: bands stay tight, close escapes
        let mut closes = vec![100.0; 30];
        closes.push(110.0);
        let snapshot = IndicatorSnapshot::compute(&candles_from_closes(&closes)).unwrap();

        assert_eq!(snapshot.bollinger_position, BollingerPosition::Upper);
    }

    #[test]
    fn test_oversold_zone_after_losses() {
        let closes: Vec<f64> = (0..30).map(|i| 200.0 - i as f64).collect();
        let snapshot = IndicatorSnapshot::compute(&candles_from_closes(&closes)).unwrap();

        assert!(snapshot.rsi < 30.0);
        assert_eq!(snapshot.rsi_zone, RsiZone::Oversold);
    }
}
