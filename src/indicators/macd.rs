use crate::indicators::moving_average::ema_series;

const FAST_PERIOD: usize = 12;
const SLOW_PERIOD: usize = 26;
const SIGNAL_PERIOD: usize = 9;

/// Calculate MACD(12, 26, 9)
///
/// Returns `(macd, signal, histogram)` where the signal line is the
/// EMA(9) of the MACD series, not of the closing prices.
pub fn calculate_macd(prices: &[f64]) -> Option<(f64, f64, f64)> {
    // Need SLOW_PERIOD prices for the first MACD value, then SIGNAL_PERIOD
    // MACD values before the signal line exists.
    if prices.len() < SLOW_PERIOD + SIGNAL_PERIOD - 1 {
        return None;
    }

    let fast = ema_series(prices, FAST_PERIOD)?;
    let slow = ema_series(prices, SLOW_PERIOD)?;

    // Both series end at the last price index; align them from the point
    // where the slow EMA starts.
    let offset = fast.len() - slow.len();
    let macd_line: Vec<f64> = slow
        .iter()
        .enumerate()
        .map(|(i, s)| fast[i + offset] - s)
        .collect();

    let signal_line = ema_series(&macd_line, SIGNAL_PERIOD)?;

    let macd = *macd_line.last()?;
    let signal = *signal_line.last()?;
    Some((macd, signal, macd - signal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macd_insufficient_data() {
        let prices = vec![100.0; 30];
        assert!(calculate_macd(&prices).is_none());
    }

    #[test]
    fn test_macd_flat_series_is_zero() {
        let prices = vec![50000.0; 60];
        let (macd, signal, histogram) = calculate_macd(&prices).unwrap();
        assert!(macd.abs() < 1e-9);
        assert!(signal.abs() < 1e-9);
        assert!(histogram.abs() < 1e-9);
    }

    #[test]
    fn test_macd_positive_in_uptrend() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let (macd, _, _) = calculate_macd(&prices).unwrap();
        assert!(macd > 0.0);
    }

    #[test]
    fn test_macd_negative_in_downtrend() {
        let prices: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        let (macd, _, _) = calculate_macd(&prices).unwrap();
        assert!(macd < 0.0);
    }

    #[test]
    fn test_histogram_shrinks_when_trend_stalls() {
        // Uptrend that flattens out: MACD falls back toward the signal line
        let mut prices: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        prices.extend(std::iter::repeat(149.0).take(20));
        let (_, _, histogram) = calculate_macd(&prices).unwrap();
        assert!(histogram < 0.0);
    }
}
