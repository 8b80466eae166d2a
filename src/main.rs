use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use tradeguard::cli::{Cli, Commands, KillCommands};
use tradeguard::clock::{Clock, SystemClock};
use tradeguard::config::AppConfig;
use tradeguard::domain::{RiskState, TradeDecision, TradeOutcome};
use tradeguard::exchange::PaperExchange;
use tradeguard::ledger::{MemoryLedger, PositionLedger};
use tradeguard::safety::FileKillSwitch;

mod main_runtime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config))?;
    if let Err(problems) = config.validate() {
        bail!("invalid configuration:\n  {}", problems.join("\n  "));
    }

    let _log_guard = main_runtime::init_logging(&config.logging);

    match cli.command {
        Commands::Status => run_status(&config).await?,
        Commands::Reset { operator } => run_reset(&config, &operator).await?,
        Commands::Kill { action } => run_kill(&config, action)?,
        Commands::Paper {
            asset,
            token,
            side,
            size,
            price,
            confidence,
            gtc,
            settle_pnl,
        } => {
            let decision = TradeDecision {
                asset,
                direction: side,
                confidence,
                target_price: price,
                size,
                token_id: token,
                order_type: Commands::paper_order_type(gtc),
            };
            run_paper(&config, decision, settle_pnl).await?;
        }
    }

    Ok(())
}

async fn run_status(config: &AppConfig) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let kill_switch = main_runtime::kill_switch(config);
    let ledger: Arc<dyn PositionLedger> = Arc::new(MemoryLedger::new(config.paper.starting_balance));
    let risk = main_runtime::open_risk_manager(config, kill_switch.clone(), ledger, clock).await?;

    print_state(&risk.status().await, &risk.breaker_state().await.to_string());
    println!(
        "kill switch:        {} ({})",
        if kill_switch.is_engaged() { "ENGAGED" } else { "released" },
        kill_switch.describe()
    );
    println!(
        "state file:         {}",
        config.persistence.risk_state_path().display()
    );
    Ok(())
}

async fn run_reset(config: &AppConfig, operator: &str) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ledger: Arc<dyn PositionLedger> = Arc::new(MemoryLedger::new(config.paper.starting_balance));
    let risk =
        main_runtime::open_risk_manager(config, main_runtime::kill_switch(config), ledger, clock)
            .await?;

    risk.operator_reset(operator).await?;
    println!("circuit breaker reset by {}", operator);
    Ok(())
}

fn run_kill(config: &AppConfig, action: KillCommands) -> anyhow::Result<()> {
    let sentinel = FileKillSwitch::new(&config.kill_switch.sentinel_path);

    match action {
        KillCommands::Engage { note } => {
            sentinel.engage(&note)?;
            println!("kill switch engaged: {}", sentinel.path().display());
        }
        KillCommands::Release => {
            sentinel.release()?;
            println!("kill switch released: {}", sentinel.path().display());
            let any = main_runtime::kill_switch(config);
            if any.is_engaged() {
                warn!(switch = %any.describe(), "another kill switch is still engaged");
                println!("note: still engaged via {}", any.describe());
            }
        }
        KillCommands::Status => {
            let any = main_runtime::kill_switch(config);
            println!(
                "{} ({})",
                if any.is_engaged() { "ENGAGED" } else { "released" },
                any.describe()
            );
        }
    }
    Ok(())
}

async fn run_paper(
    config: &AppConfig,
    decision: TradeDecision,
    settle_pnl: Option<Decimal>,
) -> anyhow::Result<()> {
    let exchange = Arc::new(PaperExchange::new(config.paper.starting_balance));
    let pipeline = main_runtime::build_pipeline(config, exchange).await?;

    let result = match pipeline.submit(decision.clone()).await {
        Ok(result) => result,
        Err(e) => {
            warn!(code = e.code(), error = %e, "decision not executed");
            println!("not executed [{}]: {}", e.code(), e);
            return Ok(());
        }
    };

    println!(
        "order {} -> {} (attempts {}, filled {} @ {})",
        result.client_order_id,
        result.state,
        result.attempts,
        result.filled_size,
        result
            .filled_price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    if let Some(slippage) = &result.slippage {
        println!(
            "slippage {} (threshold exceeded: {})",
            slippage.slippage_pct, slippage.exceeded
        );
    }

    if let (Some(pnl), Some(filled_price)) = (settle_pnl, result.filled_price) {
        let outcome = TradeOutcome::new(
            result.client_order_id.clone(),
            pnl,
            filled_price,
            decision.target_price,
            Utc::now(),
        );
        pipeline.settle(outcome).await?;
        info!(pnl = %pnl, "paper trade settled");
    }

    let risk = pipeline.risk();
    print_state(&risk.status().await, &risk.breaker_state().await.to_string());
    Ok(())
}

fn print_state(state: &RiskState, breaker: &str) {
    println!("breaker:            {}", breaker);
    println!("day:                {}", state.day_start);
    println!("daily pnl:          {}", state.daily_pnl);
    println!("consecutive losses: {}", state.consecutive_losses);
    println!("trades today:       {}", state.trades_today);
    println!(
        "cooldown until:     {}",
        state
            .cooldown_until
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "trip reason:        {}",
        state.trip_reason.map(|r| r.as_str()).unwrap_or("-")
    );
}
