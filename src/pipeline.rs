//! Decision-to-order pipeline
//!
//! in-flight slot -> risk authorization (with a trade-cap reservation) ->
//! funds check -> placement -> trade accounting. Settlement feeds the ledger and the risk manager; cancellation
//! goes straight to the executor.

use std::sync::Arc;
use tracing::{info, warn};

use crate::balance::BalanceChecker;
use crate::domain::{
    FundsCheck, OrderResult, OrderSide, OrderState, TradeDecision, TradeOutcome,
};
use crate::error::{GuardError, Result};
use crate::execution::{InFlightRegistry, OrderExecutor};
use crate::ledger::PositionLedger;
use crate::risk::RiskManager;

pub struct TradePipeline {
    risk: Arc<RiskManager>,
    balance: Arc<BalanceChecker>,
    executor: Arc<OrderExecutor>,
    ledger: Arc<dyn PositionLedger>,
    in_flight: InFlightRegistry,
}

impl TradePipeline {
    pub fn new(
        risk: Arc<RiskManager>,
        balance: Arc<BalanceChecker>,
        executor: Arc<OrderExecutor>,
        ledger: Arc<dyn PositionLedger>,
    ) -> Self {
        Self {
            risk,
            balance,
            executor,
            ledger,
            in_flight: InFlightRegistry::new(),
        }
    }

    pub fn risk(&self) -> &Arc<RiskManager> {
        &self.risk
    }

    pub fn balance(&self) -> &Arc<BalanceChecker> {
        &self.balance
    }

    pub fn executor(&self) -> &Arc<OrderExecutor> {
        &self.executor
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// Turn a decision into an order.
    ///
    /// A second decision for the same (asset, side) while one is in flight is
    /// refused with `DuplicateInFlight`, never queued.
    pub async fn submit(&self, decision: TradeDecision) -> Result<OrderResult> {
        let request = decision.to_order_request();
        let _slot = self
            .in_flight
            .try_acquire(decision.market_key(), &request.client_order_id)?;

        // Released on every early return; counted below only when the order
        // fills or rests
        let _reservation = self.risk.reserve(&decision).await?;

        if request.order_side == OrderSide::Buy {
            match self.balance.check_funds(request.notional()).await {
                FundsCheck::Sufficient { .. } => {}
                FundsCheck::Insufficient {
                    required,
                    available,
                } => return Err(GuardError::InsufficientFunds { required, available }),
                FundsCheck::Unknown { reason } => return Err(GuardError::BalanceUnavailable(reason)),
            }
        }

        info!(
            key = %decision.market_key(),
            confidence = decision.confidence,
            size = %decision.size,
            target_price = %decision.target_price,
            "submitting decision"
        );
        let result = self
            .executor
            .place_order(request, Some(decision.target_price))
            .await?;

        if matches!(result.state, OrderState::Filled | OrderState::Open) {
            if let Err(e) = self.risk.record_trade_opened().await {
                warn!(client_order_id = %result.client_order_id, error = %e, "trade count not persisted");
            }
            self.balance.invalidate().await;
        }

        Ok(result)
    }

    /// Book a settled trade
    pub async fn settle(&self, outcome: TradeOutcome) -> Result<()> {
        self.ledger.record_outcome(&outcome).await;
        self.risk.record_outcome(&outcome).await
    }

    /// Cancel an order; bypasses the kill switch and the circuit breaker
    pub async fn cancel(&self, order_id: &str) -> Result<OrderState> {
        self.executor.cancel_order(order_id).await
    }
}
