use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::error::BotError;
use crate::models::{Decision, Direction, Trade, TradeStatus};

/// SQLite-backed trade and analysis store
///
/// The schema is created on connect. A partial unique index on
/// `trades(status)` makes the store itself reject a second OPEN row, so
/// the single-open-position rule holds even if application-level
/// locking is bypassed.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Aggregate stats for one trade direction
#[derive(Debug, Clone)]
pub struct DirectionStats {
    pub direction: Direction,
    pub trades: i64,
    pub wins: i64,
    pub avg_pnl_pct: f64,
    pub total_pnl: f64,
}

/// Closed-trade performance summary, fed back into the decision prompt
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    pub total_trades: i64,
    pub wins: i64,
    pub win_rate: f64,
    pub avg_pnl_pct: f64,
    pub best_pnl_pct: f64,
    pub worst_pnl_pct: f64,
    pub total_pnl: f64,
    pub by_direction: Vec<DirectionStats>,
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self, BotError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), BotError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry_price REAL NOT NULL,
                exit_price REAL,
                amount REAL NOT NULL,
                investment_amount REAL NOT NULL,
                leverage INTEGER NOT NULL,
                sl_price REAL NOT NULL,
                tp_price REAL NOT NULL,
                sl_pct REAL NOT NULL,
                tp_pct REAL NOT NULL,
                position_size_pct REAL NOT NULL,
                status TEXT NOT NULL,
                profit_loss REAL,
                profit_loss_pct REAL,
                exit_reason TEXT,
                closed_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_status ON trades(status)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_timestamp ON trades(timestamp)")
            .execute(&self.pool)
            .await?;
        // At most one OPEN trade, enforced by the store itself
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_trades_single_open \
             ON trades(status) WHERE status = 'OPEN'",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analyses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                current_price REAL NOT NULL,
                direction TEXT NOT NULL,
                position_size_pct REAL NOT NULL,
                leverage INTEGER NOT NULL,
                sl_pct REAL NOT NULL,
                tp_pct REAL NOT NULL,
                reasoning TEXT NOT NULL,
                trade_id INTEGER REFERENCES trades(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_analyses_timestamp ON analyses(timestamp)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert a new trade and return its row id
    pub async fn save_trade(&self, trade: &Trade) -> Result<i64, BotError> {
        let result = sqlx::query(
            r#"
            INSERT INTO trades (
                timestamp, direction, entry_price, exit_price, amount,
                investment_amount, leverage, sl_price, tp_price, sl_pct, tp_pct,
                position_size_pct, status, profit_loss, profit_loss_pct,
                exit_reason, closed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trade.timestamp)
        .bind(trade.direction.as_str())
        .bind(trade.entry_price)
        .bind(trade.exit_price)
        .bind(trade.amount)
        .bind(trade.investment_amount)
        .bind(trade.leverage as i64)
        .bind(trade.sl_price)
        .bind(trade.tp_price)
        .bind(trade.sl_pct)
        .bind(trade.tp_pct)
        .bind(trade.position_size_pct)
        .bind(trade.status.as_str())
        .bind(trade.profit_loss)
        .bind(trade.profit_loss_pct)
        .bind(trade.exit_reason.as_deref())
        .bind(trade.closed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Mark a trade closed with its exit details
    pub async fn close_trade(
        &self,
        trade_id: i64,
        exit_price: f64,
        profit_loss: f64,
        profit_loss_pct: f64,
        exit_reason: &str,
        closed_at: DateTime<Utc>,
    ) -> Result<(), BotError> {
        sqlx::query(
            r#"
            UPDATE trades
            SET status = 'CLOSED', exit_price = ?, profit_loss = ?,
                profit_loss_pct = ?, exit_reason = ?, closed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(exit_price)
        .bind(profit_loss)
        .bind(profit_loss_pct)
        .bind(exit_reason)
        .bind(closed_at)
        .bind(trade_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The currently open trade, if any
    pub async fn get_open_trade(&self) -> Result<Option<Trade>, BotError> {
        let row = sqlx::query(
            "SELECT * FROM trades WHERE status = 'OPEN' ORDER BY timestamp DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| trade_from_row(&r)).transpose().map_err(Into::into)
    }

    /// Most recently closed trades, newest first
    pub async fn get_closed_trades(&self, limit: i64) -> Result<Vec<Trade>, BotError> {
        let rows = sqlx::query(
            "SELECT * FROM trades WHERE status = 'CLOSED' ORDER BY closed_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(trade_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Aggregate closed-trade performance, overall and per direction
    pub async fn performance_metrics(&self) -> Result<PerformanceMetrics, BotError> {
        let overall = sqlx::query(
            r#"
            SELECT COUNT(*) AS trades,
                   COALESCE(SUM(CASE WHEN profit_loss > 0 THEN 1 ELSE 0 END), 0) AS wins,
                   AVG(profit_loss_pct) AS avg_pct,
                   MAX(profit_loss_pct) AS best_pct,
                   MIN(profit_loss_pct) AS worst_pct,
                   COALESCE(SUM(profit_loss), 0.0) AS total_pnl
            FROM trades WHERE status = 'CLOSED'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let total_trades: i64 = overall.try_get("trades")?;
        let wins: i64 = overall.try_get("wins")?;

        let mut metrics = PerformanceMetrics {
            total_trades,
            wins,
            win_rate: if total_trades > 0 {
                wins as f64 / total_trades as f64 * 100.0
            } else {
                0.0
            },
            avg_pnl_pct: overall.try_get::<Option<f64>, _>("avg_pct")?.unwrap_or(0.0),
            best_pnl_pct: overall.try_get::<Option<f64>, _>("best_pct")?.unwrap_or(0.0),
            worst_pnl_pct: overall.try_get::<Option<f64>, _>("worst_pct")?.unwrap_or(0.0),
            total_pnl: overall.try_get("total_pnl")?,
            by_direction: Vec::new(),
        };

        let rows = sqlx::query(
            r#"
            SELECT direction,
                   COUNT(*) AS trades,
                   COALESCE(SUM(CASE WHEN profit_loss > 0 THEN 1 ELSE 0 END), 0) AS wins,
                   COALESCE(AVG(profit_loss_pct), 0.0) AS avg_pct,
                   COALESCE(SUM(profit_loss), 0.0) AS total_pnl
            FROM trades WHERE status = 'CLOSED'
            GROUP BY direction
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let direction: String = row.try_get("direction")?;
            metrics.by_direction.push(DirectionStats {
                direction: Direction::from_str_lossy(&direction),
                trades: row.try_get("trades")?,
                wins: row.try_get("wins")?,
                avg_pnl_pct: row.try_get("avg_pct")?,
                total_pnl: row.try_get("total_pnl")?,
            });
        }

        Ok(metrics)
    }

    /// Persist a decision alongside the price it was made at
    pub async fn save_analysis(
        &self,
        decision: &Decision,
        current_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<i64, BotError> {
        let result = sqlx::query(
            r#"
            INSERT INTO analyses (
                timestamp, current_price, direction, position_size_pct,
                leverage, sl_pct, tp_pct, reasoning
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(timestamp)
        .bind(current_price)
        .bind(decision.direction.as_str())
        .bind(decision.position_size_pct)
        .bind(decision.leverage as i64)
        .bind(decision.sl_pct)
        .bind(decision.tp_pct)
        .bind(&decision.reasoning)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Attach the trade opened from an analysis back onto its row
    pub async fn link_analysis_trade(
        &self,
        analysis_id: i64,
        trade_id: i64,
    ) -> Result<(), BotError> {
        sqlx::query("UPDATE analyses SET trade_id = ? WHERE id = ?")
            .bind(trade_id)
            .bind(analysis_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn trade_from_row(row: &SqliteRow) -> Result<Trade, sqlx::Error> {
    let direction: String = row.try_get("direction")?;
    let status: String = row.try_get("status")?;

    Ok(Trade {
        id: Some(row.try_get("id")?),
        timestamp: row.try_get("timestamp")?,
        direction: Direction::from_str_lossy(&direction),
        entry_price: row.try_get("entry_price")?,
        exit_price: row.try_get("exit_price")?,
        amount: row.try_get("amount")?,
        investment_amount: row.try_get("investment_amount")?,
        leverage: row.try_get::<i64, _>("leverage")? as u32,
        sl_price: row.try_get("sl_price")?,
        tp_price: row.try_get("tp_price")?,
        sl_pct: row.try_get("sl_pct")?,
        tp_pct: row.try_get("tp_pct")?,
        position_size_pct: row.try_get("position_size_pct")?,
        status: match status.as_str() {
            "OPEN" => TradeStatus::Open,
            _ => TradeStatus::Closed,
        },
        profit_loss: row.try_get("profit_loss")?,
        profit_loss_pct: row.try_get("profit_loss_pct")?,
        exit_reason: row.try_get("exit_reason")?,
        closed_at: row.try_get("closed_at")?,
    })
}
