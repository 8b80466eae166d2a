use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use tradeguard::balance::BalanceChecker;
use tradeguard::clock::{Clock, SystemClock};
use tradeguard::config::{AppConfig, LoggingConfig};
use tradeguard::error::Result;
use tradeguard::exchange::ExchangeClient;
use tradeguard::execution::{CallPacer, OrderExecutor, RetryPolicy};
use tradeguard::ledger::{MemoryLedger, PositionLedger};
use tradeguard::persistence::{JsonFileStateStore, JsonlOrderJournal};
use tradeguard::risk::RiskManager;
use tradeguard::safety::{AnyKillSwitch, KillSwitch};
use tradeguard::TradePipeline;

/// Console logging plus an optional daily-rolling file.
///
/// The returned guard must live as long as the process or buffered file
/// output is lost.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},tradeguard=debug", config.level))
    });

    let console_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    let (file_layer, guard) = match config.log_dir.as_deref().and_then(writable_log_dir) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tradeguard.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    guard
}

/// `rolling::daily` panics if it cannot create its file, so check writability first
fn writable_log_dir(dir: &Path) -> Option<&Path> {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!(
            "Warning: could not create log directory {} ({}), file logging disabled",
            dir.display(),
            e
        );
        return None;
    }
    let marker = dir.join(".tradeguard_write_test");
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&marker)
    {
        Ok(_) => {
            let _ = std::fs::remove_file(&marker);
            Some(dir)
        }
        Err(e) => {
            eprintln!(
                "Warning: could not write to log directory {} ({}), file logging disabled",
                dir.display(),
                e
            );
            None
        }
    }
}

pub fn kill_switch(config: &AppConfig) -> Arc<dyn KillSwitch> {
    Arc::new(AnyKillSwitch::from_config(&config.kill_switch))
}

pub async fn open_risk_manager(
    config: &AppConfig,
    kill_switch: Arc<dyn KillSwitch>,
    ledger: Arc<dyn PositionLedger>,
    clock: Arc<dyn Clock>,
) -> Result<Arc<RiskManager>> {
    let store = Arc::new(JsonFileStateStore::new(config.persistence.risk_state_path()));
    let risk = RiskManager::open(config.risk.clone(), store, kill_switch, ledger, clock).await?;
    Ok(Arc::new(risk))
}

/// Wire the full pipeline around `exchange`
pub async fn build_pipeline(
    config: &AppConfig,
    exchange: Arc<dyn ExchangeClient>,
) -> Result<TradePipeline> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let kill_switch = kill_switch(config);
    let ledger: Arc<dyn PositionLedger> = Arc::new(MemoryLedger::new(config.paper.starting_balance));

    // One pacer per exchange, shared by every call site
    let pacer = Arc::new(CallPacer::from_config(&config.execution));
    let journal = Arc::new(JsonlOrderJournal::new(config.persistence.order_journal_path()));

    let executor = Arc::new(OrderExecutor::new(
        exchange.clone(),
        &config.execution,
        pacer.clone(),
        kill_switch.clone(),
        clock.clone(),
        journal,
    ));
    let balance = Arc::new(BalanceChecker::new(
        exchange,
        &config.balance,
        RetryPolicy::from_config(&config.execution),
        pacer,
        clock.clone(),
    ));
    let restored = executor.restore_open_orders().await?;
    if restored > 0 {
        info!(restored, "resting orders restored from journal");
    }
    let risk = open_risk_manager(config, kill_switch, ledger.clone(), clock).await?;

    Ok(TradePipeline::new(risk, balance, executor, ledger))
}
