/// Calculate Bollinger Bands over the most recent `period` prices
///
/// Returns `(upper, middle, lower)` using a population standard
/// deviation and `k` standard deviations for the band width.
pub fn calculate_bollinger(prices: &[f64], period: usize, k: f64) -> Option<(f64, f64, f64)> {
    if prices.len() < period || period == 0 {
        return None;
    }

    let window = &prices[prices.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;

    let variance = window
        .iter()
        .map(|p| (p - middle).powi(2))
        .sum::<f64>()
        / period as f64;
    let stddev = variance.sqrt();

    Some((middle + k * stddev, middle, middle - k * stddev))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bollinger_flat_series_collapses() {
        let prices = vec![50000.0; 25];
        let (upper, middle, lower) = calculate_bollinger(&prices, 20, 2.0).unwrap();
        assert_eq!(upper, 50000.0);
        assert_eq!(middle, 50000.0);
        assert_eq!(lower, 50000.0);
    }

    #[test]
    fn test_bollinger_bands_are_symmetric() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
        let (upper, middle, lower) = calculate_bollinger(&prices, 20, 2.0).unwrap();
        assert!((upper - middle - (middle - lower)).abs() < 1e-9);
        assert!(upper > middle && middle > lower);
    }

    #[test]
    fn test_bollinger_population_stddev() {
        // Window [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, population stddev 2
        let prices = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let (upper, middle, lower) = calculate_bollinger(&prices, 8, 2.0).unwrap();
        assert!((middle - 5.0).abs() < 1e-9);
        assert!((upper - 9.0).abs() < 1e-9);
        assert!((lower - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_bollinger_insufficient_data() {
        let prices = vec![100.0; 10];
        assert!(calculate_bollinger(&prices, 20, 2.0).is_none());
    }
}
