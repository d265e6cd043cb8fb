/// Calculate Simple Moving Average (SMA) over the most recent `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if prices.len() < period || period == 0 {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA)
///
/// Seeded with the SMA of the first `period` prices, then iterated
/// forward over the remainder of the series.
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    Some(*ema_series(prices, period)?.last()?)
}

/// Full EMA series starting at price index `period - 1`
///
/// Returned vector has `prices.len() - period + 1` entries; entry `i`
/// corresponds to price index `i + period - 1`.
pub fn ema_series(prices: &[f64], period: usize) -> Option<Vec<f64>> {
    if prices.len() < period || period == 0 {
        return None;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    // Start with SMA of the first window
    let mut ema = prices[..period].iter().sum::<f64>() / period as f64;
    let mut series = Vec::with_capacity(prices.len() - period + 1);
    series.push(ema);

    for price in &prices[period..] {
        ema = (price - ema) * multiplier + ema;
        series.push(ema);
    }

    Some(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        assert_eq!(calculate_sma(&prices, 5), Some(104.0));
    }

    #[test]
    fn test_sma_uses_most_recent_window() {
        let prices = vec![1.0, 100.0, 102.0, 104.0];
        assert_eq!(calculate_sma(&prices, 3), Some(102.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = vec![100.0, 102.0];
        assert!(calculate_sma(&prices, 5).is_none());
    }

    #[test]
    fn test_ema_rises_with_uptrend() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0, 110.0];
        let ema = calculate_ema(&prices, 5).unwrap();
        assert!(ema > 104.0); // above the seed SMA
    }

    #[test]
    fn test_ema_constant_series() {
        let prices = vec![50.0; 30];
        assert_eq!(calculate_ema(&prices, 12), Some(50.0));
    }

    #[test]
    fn test_ema_series_alignment() {
        let prices = vec![100.0, 102.0, 104.0, 106.0];
        let series = ema_series(&prices, 3).unwrap();
        assert_eq!(series.len(), 2);
        assert!((series[0] - 102.0).abs() < 1e-9); // seed SMA
    }
}
