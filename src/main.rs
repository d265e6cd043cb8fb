use btcbot::api::{BinanceClient, NewsClient};
use btcbot::config::{Credentials, Settings};
use btcbot::db::Database;
use btcbot::decision::{prompt, DecisionClient};
use btcbot::execution::{TradeAction, Trader};
use btcbot::market::MarketDataCollector;
use btcbot::notify::TelegramNotifier;
use btcbot::Result;
use chrono::Utc;
use clap::Parser;
use tokio::time::{Duration, Instant};

/// BTC/USDT futures trading bot driven by an LLM decision provider
#[derive(Parser)]
#[command(name = "btcbot")]
struct Cli {
    /// Place real orders instead of trading against a simulated balance
    #[arg(long)]
    live: bool,

    /// Override the SQLite database URL
    #[arg(long)]
    db: Option<String>,
}

/// Seconds until the next wall-clock multiple of the interval, so cycles
/// land on :00, :10, :20 style boundaries instead of drifting
fn secs_until_next_tick(interval_secs: u64) -> u64 {
    let now = Utc::now().timestamp() as u64;
    interval_secs - (now % interval_secs)
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter("btcbot=info")
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if cli.live {
        settings.dry_run = false;
    }
    if let Some(db_url) = cli.db {
        settings.database_url = db_url;
    }
    let credentials = Credentials::from_env();

    tracing::info!(
        "🚀 btcbot starting | {} | {}",
        settings.symbol,
        if settings.dry_run {
            "DRY RUN (simulated balance)"
        } else {
            "LIVE TRADING"
        }
    );

    if !settings.dry_run
        && (credentials.binance_api_key.is_none() || credentials.binance_secret_key.is_none())
    {
        return Err("Live mode needs BINANCE_API_KEY and BINANCE_SECRET_KEY".into());
    }

    let db = Database::connect(&settings.database_url).await?;
    tracing::info!("Trade store ready at {}", settings.database_url);

    let api = BinanceClient::new(
        credentials.binance_api_key.clone().unwrap_or_default(),
        credentials.binance_secret_key.clone().unwrap_or_default(),
        settings.max_api_retries,
    )?;

    let news_client = match credentials.serp_api_key.clone() {
        Some(key) => Some(NewsClient::new(key)?),
        None => {
            tracing::info!("SERP_API_KEY not set, running without news context");
            None
        }
    };

    let openrouter_key = credentials
        .openrouter_api_key
        .clone()
        .ok_or("OPENROUTER_API_KEY not found in environment")?;
    let decision_client = DecisionClient::new(
        openrouter_key,
        credentials.openrouter_model.clone(),
        settings.max_api_retries,
        settings.max_reasoning_length,
    );

    let notifier = match (
        credentials.telegram_bot_token.clone(),
        credentials.telegram_chat_id.clone(),
    ) {
        (Some(token), Some(chat_id)) => Some(TelegramNotifier::new(token, chat_id)),
        _ => {
            tracing::info!("Telegram credentials not set, notifications disabled");
            None
        }
    };

    let mut collector = MarketDataCollector::new(api.clone(), news_client, &settings);
    let trader = Trader::new(
        db.clone(),
        Some(api),
        settings.symbol.clone(),
        settings.dry_run,
        settings.sim_capital,
        settings.min_order_amount,
    );

    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Analysis interval: {}s", settings.analysis_interval_secs);
    tracing::info!("  Price poll: {}s", settings.price_poll_interval_secs);
    tracing::info!(
        "  Position check: {}s",
        settings.position_check_interval_secs
    );
    if settings.dry_run {
        tracing::info!("  Simulated capital: ${:.2}", settings.sim_capital);
    }
    tracing::info!("\nPress Ctrl+C to stop...\n");

    let mut last_analysis: Option<Instant> = None;
    let mut last_position_check: Option<Instant> = None;

    loop {
        let wait = secs_until_next_tick(settings.price_poll_interval_secs);

        // Termination is only honored between cycles, never mid-transition
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(wait)) => {}
        }

        if let Err(e) = run_cycle(
            &settings,
            &mut collector,
            &trader,
            &decision_client,
            &db,
            notifier.as_ref(),
            &mut last_analysis,
            &mut last_position_check,
        )
        .await
        {
            tracing::error!("Cycle failed: {}", e);
        }
    }

    tracing::info!("👋 btcbot stopped");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_cycle(
    settings: &Settings,
    collector: &mut MarketDataCollector,
    trader: &Trader,
    decision_client: &DecisionClient,
    db: &Database,
    notifier: Option<&TelegramNotifier>,
    last_analysis: &mut Option<Instant>,
    last_position_check: &mut Option<Instant>,
) -> Result<()> {
    let price = collector.current_price().await?;

    let position_check_due = last_position_check
        .map_or(true, |t| {
            t.elapsed().as_secs() >= settings.position_check_interval_secs
        });
    if position_check_due {
        *last_position_check = Some(Instant::now());

        if let Some(closed) = trader.check_stop_loss_take_profit(price).await? {
            if let Some(notifier) = notifier {
                notifier.trade_closed(&closed).await;
            }
            // Re-analyze immediately after a triggered exit
            *last_analysis = None;
        }
    }

    let analysis_due = last_analysis.map_or(true, |t| {
        t.elapsed().as_secs() >= settings.analysis_interval_secs
    });

    if analysis_due {
        *last_analysis = Some(Instant::now());
        run_analysis(collector, trader, decision_client, db, notifier).await?;
    } else if let Some(open) = db.get_open_trade().await? {
        tracing::info!(
            "{} @ ${:.2} | entry ${:.2} | unrealized {:+.2}%",
            open.direction.as_str(),
            price,
            open.entry_price,
            open.pnl_pct_at(price)
        );
    } else {
        tracing::debug!("{} @ ${:.2}, no position", settings.symbol, price);
    }

    Ok(())
}

async fn run_analysis(
    collector: &mut MarketDataCollector,
    trader: &Trader,
    decision_client: &DecisionClient,
    db: &Database,
    notifier: Option<&TelegramNotifier>,
) -> Result<()> {
    let snapshot = collector.snapshot().await?;
    let metrics = db.performance_metrics().await?;
    let recent_trades = db.get_closed_trades(5).await?;
    let open_trade = db.get_open_trade().await?;

    let summary =
        prompt::build_market_summary(&snapshot, &metrics, &recent_trades, open_trade.as_ref());
    let decision = decision_client.request_decision(&summary).await?;

    tracing::info!(
        "Decision: {} | size {:.0}% | {}x | SL {:.1}% | TP {:.1}% | {}",
        decision.direction.as_str(),
        decision.position_size_pct * 100.0,
        decision.leverage,
        decision.sl_pct,
        decision.tp_pct,
        decision.reasoning
    );

    let analysis_id = db
        .save_analysis(&decision, snapshot.current_price, snapshot.timestamp)
        .await?;

    match trader
        .execute_decision(&decision, snapshot.current_price)
        .await?
    {
        TradeAction::Opened(trade) => {
            if let Some(trade_id) = trade.id {
                db.link_analysis_trade(analysis_id, trade_id).await?;
            }
            if let Some(notifier) = notifier {
                notifier.trade_opened(&trade).await;
            }
        }
        TradeAction::Closed(trade) => {
            if let Some(notifier) = notifier {
                notifier.trade_closed(&trade).await;
            }
        }
        TradeAction::Hold => {
            tracing::info!("No position change");
        }
    }

    Ok(())
}
