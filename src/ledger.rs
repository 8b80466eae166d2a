//! Bankroll and realized P&L feed for the risk manager

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::TradeOutcome;

#[async_trait]
pub trait PositionLedger: Send + Sync {
    async fn current_bankroll(&self) -> Decimal;

    /// Lifetime realized P&L
    async fn realized_pnl(&self) -> Decimal;

    async fn record_outcome(&self, outcome: &TradeOutcome);
}

/// Starting bankroll plus every realized outcome
#[derive(Debug)]
pub struct MemoryLedger {
    starting_bankroll: Decimal,
    realized: RwLock<Decimal>,
}

impl MemoryLedger {
    pub fn new(starting_bankroll: Decimal) -> Self {
        Self {
            starting_bankroll,
            realized: RwLock::new(Decimal::ZERO),
        }
    }
}

#[async_trait]
impl PositionLedger for MemoryLedger {
    async fn current_bankroll(&self) -> Decimal {
        self.starting_bankroll + *self.realized.read().await
    }

    async fn realized_pnl(&self) -> Decimal {
        *self.realized.read().await
    }

    async fn record_outcome(&self, outcome: &TradeOutcome) {
        *self.realized.write().await += outcome.realized_pnl;
    }
}
