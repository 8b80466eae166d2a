use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::domain::{OrderType, Side};

#[derive(Parser, Debug)]
#[command(name = "tradeguard")]
#[command(version)]
#[command(about = "Order execution and risk control for prediction-market trading", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory (default.toml plus optional <TRADEGUARD_ENV>.toml)
    #[arg(short, long, default_value = "config", global = true)]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show persisted risk state and breaker status
    Status,
    /// Clear circuit-breaker trips, loss streak and cooldown
    Reset {
        /// Operator name recorded in the log
        #[arg(long)]
        operator: String,
    },
    /// Control the file-backed kill switch
    Kill {
        #[command(subcommand)]
        action: KillCommands,
    },
    /// Submit one decision against the in-memory paper exchange
    Paper {
        /// Asset symbol, e.g. BTC
        #[arg(long)]
        asset: String,
        /// Outcome token id
        #[arg(long)]
        token: String,
        /// Market side: up|down (yes|no accepted)
        #[arg(long, default_value = "up")]
        side: Side,
        /// Shares to buy
        #[arg(long, default_value = "10")]
        size: Decimal,
        /// Limit price in (0, 1]
        #[arg(long, default_value = "0.50")]
        price: Decimal,
        /// Strategy confidence, carried for logging
        #[arg(long, default_value = "0.5")]
        confidence: f64,
        /// Rest on the book (GTC) instead of fill-or-kill
        #[arg(long)]
        gtc: bool,
        /// Settle the filled trade immediately with this P&L
        #[arg(long, allow_hyphen_values = true)]
        settle_pnl: Option<Decimal>,
    },
}

#[derive(Subcommand, Debug)]
pub enum KillCommands {
    /// Create the sentinel file; new orders stop immediately
    Engage {
        /// Note written into the sentinel file
        #[arg(long, default_value = "engaged by operator")]
        note: String,
    },
    /// Remove the sentinel file
    Release,
    /// Show whether any configured kill switch is engaged
    Status,
}

impl Commands {
    pub fn paper_order_type(gtc: bool) -> OrderType {
        if gtc {
            OrderType::GoodTilCancelled
        } else {
            OrderType::FillOrKill
        }
    }
}
