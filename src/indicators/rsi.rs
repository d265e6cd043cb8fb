/// Relative Strength Index over the trailing `period` price changes
///
/// Averages the gains and the losses of the last `period` deltas and
/// maps their ratio onto 0..100. A window with no losses saturates at
/// 100; fewer than `period + 1` prices yield `None` and the snapshot
/// substitutes a neutral 50.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if prices.len() < period + 1 {
        return None;
    }

    let mut gains = Vec::new();
    let mut losses = Vec::new();

    for pair in prices.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(-change);
        }
    }

    let avg_gain: f64 = gains.iter().rev().take(period).sum::<f64>() / period as f64;
    let avg_loss: f64 = losses.iter().rev().take(period).sum::<f64>() / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_series_stays_inside_the_open_interval() {
        let prices = vec![
            97.0, 97.4, 96.8, 97.9, 98.2, 97.6, 98.8, 99.1, 98.5, 99.4, 100.2, 99.7, 100.9,
            101.3, 100.8,
        ];

        let rsi = calculate_rsi(&prices, 14).unwrap();
        assert!(rsi > 0.0 && rsi < 100.0);
        assert!(rsi > 50.0); // more gains than losses in this window
    }

    #[test]
    fn test_needs_period_plus_one_prices() {
        let prices = vec![100.0; 14];
        assert!(calculate_rsi(&prices, 14).is_none());
    }

    #[test]
    fn test_saturates_at_100_without_losses() {
        let prices: Vec<f64> = (0..6).map(|i| 100.0 + i as f64 * 0.5).collect();
        assert_eq!(calculate_rsi(&prices, 5), Some(100.0));
    }

    #[test]
    fn test_pure_decline_reads_zero() {
        let prices: Vec<f64> = (0..6).map(|i| 110.0 - i as f64).collect();
        let rsi = calculate_rsi(&prices, 5).unwrap();
        assert!(rsi.abs() < 1e-9);
    }
}
