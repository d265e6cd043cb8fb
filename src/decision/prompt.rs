use crate::db::PerformanceMetrics;
use crate::market::MarketSnapshot;
use crate::models::{Timeframe, Trade};

/// Instructions pinned to every decision request
pub const SYSTEM_PROMPT: &str = r#"You are a disciplined BTC/USDT futures trading analyst. Based on the market summary you receive, decide whether to go LONG, go SHORT, or hold NO_POSITION.

Respond ONLY with a JSON object in exactly this schema (no markdown, no extra text):

{
  "direction": "LONG|SHORT|NO_POSITION",
  "recommended_position_size": 0.5,
  "recommended_leverage": 2,
  "stop_loss_percentage": 2.0,
  "take_profit_percentage": 4.0,
  "reasoning": "1-3 sentences explaining the decision"
}

Constraints:
- recommended_position_size: fraction of available balance, 0.1 to 1.0
- recommended_leverage: integer 1 to 5
- stop_loss_percentage: 0.5 to 10.0 (distance from entry)
- take_profit_percentage: 1.0 to 20.0 (distance from entry)
- Prefer NO_POSITION when signals conflict or conviction is low"#;

/// Render the market snapshot, account history and open position into
/// the prompt sent to the decision model
pub fn build_market_summary(
    snapshot: &MarketSnapshot,
    metrics: &PerformanceMetrics,
    recent_trades: &[Trade],
    open_trade: Option<&Trade>,
) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "# BTC/USDT Market Summary ({})\n\nCurrent price: ${:.2}\n",
        snapshot.timestamp.format("%Y-%m-%d %H:%M UTC"),
        snapshot.current_price
    ));

    for timeframe in Timeframe::ALL {
        out.push_str(&format!("\n## {} timeframe\n", timeframe));

        match snapshot.indicators.get(&timeframe) {
            Some(ind) => {
                out.push_str(&format!(
                    "- SMA(7): {:.2} | SMA(21): {:.2} | cross {}\n\
                     - RSI(14): {:.1} ({})\n\
                     - MACD: {:.2} | signal: {:.2} | histogram: {:+.2}\n\
                     - Bollinger(20, 2): upper {:.2} / middle {:.2} / lower {:.2}, price {}\n",
                    ind.sma_7,
                    ind.sma_21,
                    ind.sma_trend.as_str(),
                    ind.rsi,
                    ind.rsi_zone.as_str(),
                    ind.macd,
                    ind.macd_signal,
                    ind.macd_histogram,
                    ind.bb_upper,
                    ind.bb_middle,
                    ind.bb_lower,
                    ind.bollinger_position.as_str(),
                ));
            }
            None => out.push_str("- indicators unavailable (insufficient data)\n"),
        }

        match snapshot.price_action.get(&timeframe) {
            Some(pa) => {
                out.push_str(&format!(
                    "- Price action: {}, {} volatility ({:.1}% range), current candle {}\n",
                    pa.trend.as_str(),
                    pa.volatility.as_str(),
                    pa.range_pct,
                    pa.current_direction.as_str(),
                ));
                if !pa.patterns.is_empty() {
                    let patterns: Vec<&str> = pa.patterns.iter().map(|p| p.as_str()).collect();
                    out.push_str(&format!("- Patterns: {}\n", patterns.join(", ")));
                }
            }
            None => out.push_str("- Price action: unknown\n"),
        }

        match snapshot.volume.get(&timeframe) {
            Some(vol) => {
                out.push_str(&format!(
                    "- Volume: {:.0} vs avg {:.0} ({:.2}x){} - {}\n",
                    vol.current,
                    vol.average,
                    vol.ratio,
                    if vol.spike { " SPIKE" } else { "" },
                    vol.confirmation.as_str(),
                ));
            }
            None => out.push_str("- Volume: unknown\n"),
        }
    }

    if !snapshot.news.is_empty() {
        out.push_str("\n## Recent headlines\n");
        for item in &snapshot.news {
            out.push_str(&format!("- {} ({})\n", item.title, item.source));
        }
    }

    out.push_str("\n## Current position\n");
    match open_trade {
        Some(trade) => {
            let unrealized = trade.pnl_pct_at(snapshot.current_price);
            out.push_str(&format!(
                "{} {}x | entry ${:.2} | SL ${:.2} | TP ${:.2} | unrealized {:+.2}%\n",
                trade.direction.as_str(),
                trade.leverage,
                trade.entry_price,
                trade.sl_price,
                trade.tp_price,
                unrealized,
            ));
        }
        None => out.push_str("No open position.\n"),
    }

    out.push_str("\n## Trading performance\n");
    if metrics.total_trades == 0 {
        out.push_str("No closed trades yet.\n");
    } else {
        out.push_str(&format!(
            "Closed trades: {} | win rate: {:.1}% | avg P&L: {:+.2}% | best: {:+.2}% | worst: {:+.2}% | total: {:+.2} USDT\n",
            metrics.total_trades,
            metrics.win_rate,
            metrics.avg_pnl_pct,
            metrics.best_pnl_pct,
            metrics.worst_pnl_pct,
            metrics.total_pnl,
        ));
        for stats in &metrics.by_direction {
            out.push_str(&format!(
                "- {}: {} trades, {} wins, avg {:+.2}%\n",
                stats.direction.as_str(),
                stats.trades,
                stats.wins,
                stats.avg_pnl_pct,
            ));
        }
    }

    if !recent_trades.is_empty() {
        out.push_str("\n## Last closed trades\n");
        for trade in recent_trades {
            out.push_str(&format!(
                "- {} {}x @ ${:.2} -> ${:.2} = {:+.2}% ({})\n",
                trade.direction.as_str(),
                trade.leverage,
                trade.entry_price,
                trade.exit_price.unwrap_or(0.0),
                trade.profit_loss_pct.unwrap_or(0.0),
                trade.exit_reason.as_deref().unwrap_or("unknown"),
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{BollingerPosition, IndicatorSnapshot, RsiZone, SmaTrend};
    use crate::models::{Direction, TradeStatus};
    use chrono::Utc;
    use std::collections::HashMap;

    fn snapshot_with_one_timeframe() -> MarketSnapshot {
        let mut indicators = HashMap::new();
        indicators.insert(
            Timeframe::H1,
            IndicatorSnapshot {
                sma_7: 50100.0,
                sma_21: 49900.0,
                rsi: 75.0,
                macd: 120.0,
                macd_signal: 100.0,
                macd_histogram: 20.0,
                bb_upper: 51000.0,
                bb_middle: 50000.0,
                bb_lower: 49000.0,
                sma_trend: SmaTrend::Bullish,
                bollinger_position: BollingerPosition::Middle,
                rsi_zone: RsiZone::Overbought,
            },
        );

        MarketSnapshot {
            timestamp: Utc::now(),
            current_price: 50250.0,
            indicators,
            price_action: HashMap::new(),
            volume: HashMap::new(),
            news: vec![],
        }
    }

    #[test]
    fn test_summary_includes_indicators_and_price() {
        let summary = build_market_summary(
            &snapshot_with_one_timeframe(),
            &PerformanceMetrics::default(),
            &[],
            None,
        );

        assert!(summary.contains("$50250.00"));
        assert!(summary.contains("RSI(14): 75.0 (overbought)"));
        assert!(summary.contains("No open position."));
        assert!(summary.contains("No closed trades yet."));
        // Timeframes without data are marked unknown, not omitted silently
        assert!(summary.contains("indicators unavailable"));
    }

    #[test]
    fn test_summary_shows_open_position_with_unrealized_pnl() {
        let trade = Trade {
            id: Some(1),
            timestamp: Utc::now(),
            direction: Direction::Long,
            entry_price: 50000.0,
            exit_price: None,
            amount: 0.1,
            investment_amount: 5000.0,
            leverage: 2,
            sl_price: 49000.0,
            tp_price: 52000.0,
            sl_pct: 2.0,
            tp_pct: 4.0,
            position_size_pct: 0.5,
            status: TradeStatus::Open,
            profit_loss: None,
            profit_loss_pct: None,
            exit_reason: None,
            closed_at: None,
        };

        let summary = build_market_summary(
            &snapshot_with_one_timeframe(),
            &PerformanceMetrics::default(),
            &[],
            Some(&trade),
        );

        // +0.5% move at 2x leverage
        assert!(summary.contains("unrealized +1.00%"));
        assert!(summary.contains("LONG 2x"));
    }
}
