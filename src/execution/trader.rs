use chrono::Utc;
use tokio::sync::Mutex;

use crate::api::BinanceClient;
use crate::db::Database;
use crate::error::BotError;
use crate::models::{Decision, Direction, Trade, TradeStatus};

// Never commit the entire balance; leave margin headroom
const MAX_BALANCE_FRACTION: f64 = 0.95;

/// Outcome of applying a decision to the current position state
#[derive(Debug, Clone)]
pub enum TradeAction {
    Opened(Trade),
    Closed(Trade),
    Hold,
}

struct TraderState {
    sim_balance: f64,
}

/// Executes decisions against the exchange (or a simulated balance) and
/// keeps the trade store consistent
///
/// All position transitions run under one async mutex, so the
/// read-check-then-write around "is a trade already open" cannot
/// interleave. The store's partial unique index backs this up.
pub struct Trader {
    db: Database,
    api: Option<BinanceClient>,
    symbol: String,
    dry_run: bool,
    min_order_amount: f64,
    state: Mutex<TraderState>,
}

impl Trader {
    pub fn new(
        db: Database,
        api: Option<BinanceClient>,
        symbol: String,
        dry_run: bool,
        sim_capital: f64,
        min_order_amount: f64,
    ) -> Self {
        Self {
            db,
            api,
            symbol,
            dry_run,
            min_order_amount,
            state: Mutex::new(TraderState {
                sim_balance: sim_capital,
            }),
        }
    }

    /// Available balance in USDT (simulated in dry-run mode)
    pub async fn available_balance(&self) -> Result<f64, BotError> {
        let state = self.state.lock().await;
        self.balance_locked(&state).await
    }

    /// Apply a decision to the current position state
    pub async fn execute_decision(
        &self,
        decision: &Decision,
        current_price: f64,
    ) -> Result<TradeAction, BotError> {
        let mut state = self.state.lock().await;
        let open = self.db.get_open_trade().await?;

        match (decision.direction, open) {
            (Direction::NoPosition, Some(trade)) => {
                let closed = self
                    .close_locked(&mut state, &trade, current_price, "decision")
                    .await?;
                Ok(TradeAction::Closed(closed))
            }
            (Direction::NoPosition, None) => Ok(TradeAction::Hold),
            (direction, Some(trade)) if trade.direction == direction => {
                tracing::info!(
                    "Holding existing {} position from ${:.2}",
                    direction.as_str(),
                    trade.entry_price
                );
                Ok(TradeAction::Hold)
            }
            (_, Some(trade)) => {
                // Direction flipped: close the old side first; the new side
                // opens on the next analysis cycle.
                let closed = self
                    .close_locked(&mut state, &trade, current_price, "direction_change")
                    .await?;
                Ok(TradeAction::Closed(closed))
            }
            (_, None) => {
                let opened = self.open_locked(&mut state, decision, current_price).await?;
                Ok(TradeAction::Opened(opened))
            }
        }
    }

    /// Open a new position per the decision
    pub async fn open_position(
        &self,
        decision: &Decision,
        entry_price: f64,
    ) -> Result<Trade, BotError> {
        let mut state = self.state.lock().await;
        if self.db.get_open_trade().await?.is_some() {
            return Err(BotError::StateViolation(
                "a position is already open".to_string(),
            ));
        }
        self.open_locked(&mut state, decision, entry_price).await
    }

    /// Close the given open trade at the given price
    pub async fn close_position(
        &self,
        trade: &Trade,
        exit_price: f64,
        reason: &str,
    ) -> Result<Trade, BotError> {
        let mut state = self.state.lock().await;
        self.close_locked(&mut state, trade, exit_price, reason).await
    }

    /// Check the open trade against its stop-loss and take-profit levels
    ///
    /// The stop-loss is evaluated first; when a price move crosses both
    /// levels in one poll, the position closes as a stop-loss.
    pub async fn check_stop_loss_take_profit(
        &self,
        current_price: f64,
    ) -> Result<Option<Trade>, BotError> {
        let mut state = self.state.lock().await;
        let Some(trade) = self.db.get_open_trade().await? else {
            return Ok(None);
        };

        let sl_hit = match trade.direction {
            Direction::Short => current_price >= trade.sl_price,
            _ => current_price <= trade.sl_price,
        };
        if sl_hit {
            let closed = self
                .close_locked(&mut state, &trade, current_price, "stop_loss")
                .await?;
            return Ok(Some(closed));
        }

        let tp_hit = match trade.direction {
            Direction::Short => current_price <= trade.tp_price,
            _ => current_price >= trade.tp_price,
        };
        if tp_hit {
            let closed = self
                .close_locked(&mut state, &trade, current_price, "take_profit")
                .await?;
            return Ok(Some(closed));
        }

        Ok(None)
    }

    async fn balance_locked(&self, state: &TraderState) -> Result<f64, BotError> {
        if self.dry_run {
            return Ok(state.sim_balance);
        }

        let api = self.api.as_ref().ok_or_else(|| {
            BotError::StateViolation("live mode requires an exchange client".to_string())
        })?;
        Ok(api.available_balance().await?)
    }

    async fn open_locked(
        &self,
        state: &mut TraderState,
        decision: &Decision,
        entry_price: f64,
    ) -> Result<Trade, BotError> {
        if decision.direction == Direction::NoPosition {
            return Err(BotError::StateViolation(
                "cannot open a NO_POSITION trade".to_string(),
            ));
        }

        let balance = self.balance_locked(state).await?;
        if balance < self.min_order_amount {
            return Err(BotError::InsufficientData(format!(
                "balance {:.2} below minimum order amount {:.2}",
                balance, self.min_order_amount
            )));
        }

        let investment = (balance * decision.position_size_pct)
            .min(balance * MAX_BALANCE_FRACTION)
            .max(self.min_order_amount);
        let amount = investment / entry_price;

        let (sl_price, tp_price) = match decision.direction {
            Direction::Short => (
                entry_price * (1.0 + decision.sl_pct / 100.0),
                entry_price * (1.0 - decision.tp_pct / 100.0),
            ),
            _ => (
                entry_price * (1.0 - decision.sl_pct / 100.0),
                entry_price * (1.0 + decision.tp_pct / 100.0),
            ),
        };

        if !self.dry_run {
            let api = self.api.as_ref().ok_or_else(|| {
                BotError::StateViolation("live mode requires an exchange client".to_string())
            })?;
            api.set_leverage(&self.symbol, decision.leverage).await?;
            let side = match decision.direction {
                Direction::Short => "SELL",
                _ => "BUY",
            };
            api.place_market_order(&self.symbol, side, amount).await?;
        }

        let mut trade = Trade {
            id: None,
            timestamp: Utc::now(),
            direction: decision.direction,
            entry_price,
            exit_price: None,
            amount,
            investment_amount: investment,
            leverage: decision.leverage,
            sl_price,
            tp_price,
            sl_pct: decision.sl_pct,
            tp_pct: decision.tp_pct,
            position_size_pct: decision.position_size_pct,
            status: TradeStatus::Open,
            profit_loss: None,
            profit_loss_pct: None,
            exit_reason: None,
            closed_at: None,
        };

        let id = self.db.save_trade(&trade).await?;
        trade.id = Some(id);

        // The committed margin is no longer free capital
        if self.dry_run {
            state.sim_balance -= investment;
        }

        tracing::info!(
            "Opened {} {}x | entry ${:.2} | amount {:.6} | SL ${:.2} | TP ${:.2}",
            trade.direction.as_str(),
            trade.leverage,
            entry_price,
            amount,
            sl_price,
            tp_price
        );

        Ok(trade)
    }

    async fn close_locked(
        &self,
        state: &mut TraderState,
        trade: &Trade,
        exit_price: f64,
        reason: &str,
    ) -> Result<Trade, BotError> {
        if trade.status != TradeStatus::Open {
            return Err(BotError::StateViolation(
                "trade is already closed".to_string(),
            ));
        }
        let trade_id = trade
            .id
            .ok_or_else(|| BotError::StateViolation("trade has no id".to_string()))?;

        let profit_loss_pct = trade.pnl_pct_at(exit_price);
        let profit_loss = trade.pnl_at(exit_price);

        if !self.dry_run {
            let api = self.api.as_ref().ok_or_else(|| {
                BotError::StateViolation("live mode requires an exchange client".to_string())
            })?;
            // Opposite side flattens the position
            let side = match trade.direction {
                Direction::Short => "BUY",
                _ => "SELL",
            };
            api.place_market_order(&self.symbol, side, trade.amount)
                .await?;
        }

        let closed_at = Utc::now();
        self.db
            .close_trade(
                trade_id,
                exit_price,
                profit_loss,
                profit_loss_pct,
                reason,
                closed_at,
            )
            .await?;

        if self.dry_run {
            state.sim_balance += trade.investment_amount + profit_loss;
        }

        tracing::info!(
            "Closed {} | entry ${:.2} -> exit ${:.2} | P&L {:+.2} USDT ({:+.2}%) | {}",
            trade.direction.as_str(),
            trade.entry_price,
            exit_price,
            profit_loss,
            profit_loss_pct,
            reason
        );

        Ok(Trade {
            exit_price: Some(exit_price),
            status: TradeStatus::Closed,
            profit_loss: Some(profit_loss),
            profit_loss_pct: Some(profit_loss_pct),
            exit_reason: Some(reason.to_string()),
            closed_at: Some(closed_at),
            ..trade.clone()
        })
    }
}
