use crate::models::Candle;
use serde::{Deserialize, Serialize};

const VOLUME_PERIOD: usize = 20;
const SPIKE_RATIO: f64 = 2.0;
const CONFIRM_RATIO: f64 = 1.1;
const WEAK_RATIO: f64 = 0.9;

/// Whether the current volume backs up the current candle's direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendConfirmation {
    BullishConfirmed,
    BearishConfirmed,
    WeakConfirmation,
    Neutral,
}

impl TrendConfirmation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendConfirmation::BullishConfirmed => "bullish move confirmed by volume",
            TrendConfirmation::BearishConfirmed => "bearish move confirmed by volume",
            TrendConfirmation::WeakConfirmation => "weak volume behind the move",
            TrendConfirmation::Neutral => "volume is neutral",
        }
    }
}

/// Volume classification for one timeframe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeAnalysis {
    pub current: f64,
    pub average: f64,
    /// Current volume relative to the rolling average
    pub ratio: f64,
    pub spike: bool,
    pub confirmation: TrendConfirmation,
}

impl VolumeAnalysis {
    fn neutral() -> VolumeAnalysis {
        VolumeAnalysis {
            current: 0.0,
            average: 0.0,
            ratio: 0.0,
            spike: false,
            confirmation: TrendConfirmation::Neutral,
        }
    }
}

/// Compare the latest candle's volume against the trailing average
///
/// Elevated volume (ratio above 1.1) confirms the direction the current
/// candle is pointing; thin volume (below 0.9) marks the move as weak.
/// With fewer than 20 candles the result is neutral and zero-filled
/// rather than an error.
pub fn analyze_volume(candles: &[Candle]) -> VolumeAnalysis {
    if candles.len() < VOLUME_PERIOD {
        return VolumeAnalysis::neutral();
    }
    let Some(last) = candles.last() else {
        return VolumeAnalysis::neutral();
    };

    let window = &candles[candles.len() - VOLUME_PERIOD..];
    let average = window.iter().map(|c| c.volume).sum::<f64>() / VOLUME_PERIOD as f64;
    if average <= 0.0 {
        return VolumeAnalysis::neutral();
    }

    let ratio = last.volume / average;
    let bullish_candle = last.close > last.open;

    let confirmation = if ratio > CONFIRM_RATIO {
        if bullish_candle {
            TrendConfirmation::BullishConfirmed
        } else {
            TrendConfirmation::BearishConfirmed
        }
    } else if ratio < WEAK_RATIO {
        TrendConfirmation::WeakConfirmation
    } else {
        TrendConfirmation::Neutral
    };

    VolumeAnalysis {
        current: last.volume,
        average,
        ratio,
        spike: ratio > SPIKE_RATIO,
        confirmation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(open: f64, close: f64, volume: f64) -> Candle {
        Candle {
            timestamp: Utc::now(),
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume,
        }
    }

    fn series(last: Candle) -> Vec<Candle> {
        let mut candles = vec![candle(100.0, 100.5, 1000.0); VOLUME_PERIOD - 1];
        candles.push(last);
        candles
    }

    #[test]
    fn test_short_series_is_neutral_zero_filled() {
        let candles = vec![candle(100.0, 100.5, 1000.0); VOLUME_PERIOD - 1];
        let analysis = analyze_volume(&candles);

        assert_eq!(analysis.confirmation, TrendConfirmation::Neutral);
        assert_eq!(analysis.current, 0.0);
        assert_eq!(analysis.average, 0.0);
        assert_eq!(analysis.ratio, 0.0);
        assert!(!analysis.spike);
    }

    #[test]
    fn test_spike_on_bullish_candle_confirms_bullish() {
        let analysis = analyze_volume(&series(candle(100.0, 102.0, 3000.0)));
        // avg = (19*1000 + 3000) / 20 = 1100
        assert!((analysis.average - 1100.0).abs() < 1e-9);
        assert!(analysis.spike);
        assert_eq!(analysis.confirmation, TrendConfirmation::BullishConfirmed);
    }

    #[test]
    fn test_same_spike_on_bearish_candle_confirms_bearish() {
        let analysis = analyze_volume(&series(candle(102.0, 100.0, 3000.0)));
        assert!(analysis.spike);
        assert_eq!(analysis.confirmation, TrendConfirmation::BearishConfirmed);
    }

    #[test]
    fn test_thin_volume_is_weak() {
        let analysis = analyze_volume(&series(candle(100.0, 102.0, 500.0)));
        assert!(!analysis.spike);
        assert_eq!(analysis.confirmation, TrendConfirmation::WeakConfirmation);
    }

    #[test]
    fn test_average_volume_is_neutral() {
        let analysis = analyze_volume(&series(candle(100.0, 102.0, 1000.0)));
        assert_eq!(analysis.confirmation, TrendConfirmation::Neutral);
        assert!(!analysis.spike);
    }

    #[test]
    fn test_moderately_elevated_volume_confirms_without_spike() {
        // ratio = 1500 / 1025 = 1.46: confirmed but not a spike
        let analysis = analyze_volume(&series(candle(100.0, 102.0, 1500.0)));
        assert!(!analysis.spike);
        assert_eq!(analysis.confirmation, TrendConfirmation::BullishConfirmed);
    }
}
