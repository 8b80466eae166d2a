pub mod balance;
pub mod cli;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod execution;
pub mod ledger;
pub mod persistence;
pub mod pipeline;
pub mod risk;
pub mod safety;

pub use balance::BalanceChecker;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::{GuardError, Result};
pub use exchange::{ExchangeClient, PaperExchange};
pub use execution::{CallPacer, InFlightRegistry, OrderExecutor, RetryPolicy, SlippageMonitor};
pub use ledger::{MemoryLedger, PositionLedger};
pub use persistence::{
    JsonFileStateStore, JsonlOrderJournal, MemoryOrderJournal, MemoryStateStore, OrderJournal,
    RiskStateStore,
};
pub use pipeline::TradePipeline;
pub use risk::RiskManager;
pub use safety::{AnyKillSwitch, EnvKillSwitch, FileKillSwitch, KillSwitch, MemoryKillSwitch};
