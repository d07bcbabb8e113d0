use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{BotEvent, Config, EventSink, MarketDataSource};
use engine::{
    CycleScheduler, EmergencyKillSwitch, EngineSettings, HealthMonitor, TradeBook, TradingEngine,
};
use paper::SimulatedMarket;
use storage::{CandleStore, DbPool};
use strategy::{StrategyFileConfig, StrategyRegistry};

const SIMULATED_BALANCE_USDT: f64 = 10_000.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid configuration")?;
    info!(
        exchange = %cfg.exchange,
        instruments = ?cfg.instruments,
        interval = %cfg.candle_interval,
        auto_trading = cfg.auto_trading,
        "Sniper bot starting"
    );

    // ── Database ──────────────────────────────────────────────────────────────
    let pool = DbPool::connect(&cfg.database_url, cfg.pool)
        .await
        .context("failed to open database")?;
    pool.init_schema().await.context("database migration failed")?;
    let pool = Arc::new(pool);
    info!(connections = pool.size(), "Database ready");

    // ── Strategies ────────────────────────────────────────────────────────────
    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)?;
    let registry = StrategyRegistry::from_config(&strategy_file)?;

    // ── Market data ───────────────────────────────────────────────────────────
    let source: Arc<dyn MarketDataSource> = match cfg.exchange.as_str() {
        "simulated" => Arc::new(SimulatedMarket::new(&cfg.exchange, SIMULATED_BALANCE_USDT)),
        other => bail!("unsupported exchange '{other}'"),
    };
    match source.get_wallet_balance().await {
        Ok(balances) => {
            for b in balances {
                info!(currency = %b.currency, balance = b.balance, "Wallet balance");
            }
        }
        Err(e) => warn!(error = %e, "Could not query wallet balance"),
    }

    // ── Events ────────────────────────────────────────────────────────────────
    let (events, mut event_rx) = EventSink::channel();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match &event {
                BotEvent::InstrumentBlacklisted { .. } | BotEvent::EmergencyExitExecuted { .. } => {
                    error!(alert = %event, "Bot event")
                }
                BotEvent::LivenessWarning { .. } => warn!(alert = %event, "Bot event"),
                BotEvent::TradeOpened { .. } => info!(alert = %event, "Bot event"),
            }
        }
    });

    // ── Engine ────────────────────────────────────────────────────────────────
    let trades = Arc::new(TradeBook::new());
    let health = Arc::new(HealthMonitor::new(cfg.blacklist_failure_threshold, events.clone()));
    let engine = Arc::new(TradingEngine::new(
        source,
        CandleStore::new(pool.clone()),
        registry,
        trades.clone(),
        health,
        EngineSettings::from_config(&cfg),
        events.clone(),
    ));
    let kill_switch = Arc::new(EmergencyKillSwitch::new(
        trades,
        cfg.kill_switch_password.clone(),
        events,
    ));

    // ── Tasks ─────────────────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let api_state = api::AppState {
        engine: engine.clone(),
        kill_switch,
        dashboard_token: cfg.dashboard_token.clone(),
    };
    let listener = api::bind(cfg.dashboard_port)
        .await
        .with_context(|| format!("failed to bind operator API port {}", cfg.dashboard_port))?;
    let mut api_shutdown = shutdown_rx.clone();
    let mut api_task = tokio::spawn(api::serve(api_state, listener, async move {
        let _ = api_shutdown.wait_for(|stop| *stop).await;
    }));

    let scheduler = CycleScheduler::new(
        engine,
        cfg.instruments.clone(),
        cfg.refresh_interval,
        cfg.max_concurrent_instruments,
    );
    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx));

    info!("All subsystems started. Waiting for shutdown signal.");
    let early_exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("Shutdown signal received, draining current cycle");
            None
        }
        joined = &mut api_task => {
            error!("Operator API exited unexpectedly, shutting down");
            Some(joined)
        }
    };
    let _ = shutdown_tx.send(true);
    let api_result = match early_exit {
        Some(joined) => joined,
        None => api_task.await,
    };

    if let Err(e) = scheduler_task.await {
        error!(error = %e, "Scheduler task failed");
    }
    let api_failed = match api_result {
        Ok(Err(e)) => {
            error!(error = %e, "Operator API failed");
            true
        }
        Err(e) => {
            error!(error = %e, "Operator API task failed");
            true
        }
        Ok(Ok(())) => false,
    };
    pool.close().await;
    if api_failed {
        bail!("operator API stopped with an error");
    }
    info!("Shutdown complete");
    Ok(())
}
