use crate::models::Trade;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Fire-and-forget Telegram notifications for trade events
///
/// Delivery problems are logged and swallowed; a notification failure
/// must never stall or fail a trading cycle.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self::with_base_url(bot_token, chat_id, TELEGRAM_API_BASE)
    }

    pub fn with_base_url(bot_token: String, chat_id: String, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
        }
    }

    pub async fn trade_opened(&self, trade: &Trade) {
        self.send(&format!(
            "📈 Opened {} {}x\nEntry: ${:.2}\nSL: ${:.2} | TP: ${:.2}\nAmount: {:.6} BTC",
            trade.direction.as_str(),
            trade.leverage,
            trade.entry_price,
            trade.sl_price,
            trade.tp_price,
            trade.amount
        ))
        .await;
    }

    pub async fn trade_closed(&self, trade: &Trade) {
        let pnl = trade.profit_loss.unwrap_or(0.0);
        let pnl_pct = trade.profit_loss_pct.unwrap_or(0.0);
        self.send(&format!(
            "{} Closed {} {}x\nEntry: ${:.2} -> Exit: ${:.2}\nP&L: {:+.2} USDT ({:+.2}%)\nReason: {}",
            if pnl >= 0.0 { "✅" } else { "❌" },
            trade.direction.as_str(),
            trade.leverage,
            trade.entry_price,
            trade.exit_price.unwrap_or(0.0),
            pnl,
            pnl_pct,
            trade.exit_reason.as_deref().unwrap_or("unknown")
        ))
        .await;
    }

    pub async fn send(&self, text: &str) {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });

        match self.client.post(&url).json(&body).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!("Telegram rejected notification: {}", response.status());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Telegram notification failed: {}", e);
            }
        }
    }
}
