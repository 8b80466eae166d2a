//! Account-level circuit breaker
//!
//! Every new order is authorized here first. The manager owns the single
//! [`RiskState`], serializes all mutation behind one async mutex and persists
//! the state after every change. A failed persist blocks authorization until
//! a later persist succeeds; it never blocks cancellation, which does not pass
//! through this gate.

use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::RiskConfig;
use crate::domain::{
    Authorization, BreakerState, DenyReason, RiskState, TradeDecision, TradeOutcome, TripReason,
};
use crate::error::{GuardError, Result};
use crate::ledger::PositionLedger;
use crate::persistence::RiskStateStore;
use crate::safety::KillSwitch;

pub struct RiskManager {
    config: RiskConfig,
    state: Mutex<RiskState>,
    store: Arc<dyn RiskStateStore>,
    kill_switch: Arc<dyn KillSwitch>,
    ledger: Arc<dyn PositionLedger>,
    clock: Arc<dyn Clock>,
    /// False after a failed persist, until the next successful one
    persist_healthy: AtomicBool,
    /// Reserved trades whose placement has not finished yet
    pending_trades: Arc<AtomicU32>,
}

/// A slot against the daily trade cap, taken in the same critical section as
/// the authorization that granted it. Dropping it gives the slot back, so a
/// trade that counts must be recorded with
/// [`RiskManager::record_trade_opened`] before the reservation is dropped.
#[must_use]
#[derive(Debug)]
pub struct TradeReservation {
    pending: Arc<AtomicU32>,
}

impl Drop for TradeReservation {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RiskManager {
    /// Restore persisted state, or start fresh when there is none
    pub async fn open(
        config: RiskConfig,
        store: Arc<dyn RiskStateStore>,
        kill_switch: Arc<dyn KillSwitch>,
        ledger: Arc<dyn PositionLedger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let state = match store.load().await? {
            Some(state) => {
                info!(
                    day = %state.day_start,
                    daily_pnl = %state.daily_pnl,
                    consecutive_losses = state.consecutive_losses,
                    tripped = state.tripped,
                    "restored risk state"
                );
                state
            }
            None => RiskState::fresh(clock.now()),
        };

        Ok(Self {
            config,
            state: Mutex::new(state),
            store,
            kill_switch,
            ledger,
            clock,
            persist_healthy: AtomicBool::new(true),
            pending_trades: Arc::new(AtomicU32::new(0)),
        })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Gate a new order. Checks run in a fixed priority order and the first
    /// match decides the denial reason.
    pub async fn authorize(&self, candidate: &TradeDecision) -> Authorization {
        let mut state = self.state.lock().await;
        self.evaluate(&mut state, candidate).await
    }

    /// Authorize and, when allowed, hold a slot against the daily trade cap
    /// until the returned reservation is dropped. Concurrent callers can never
    /// overshoot the cap between authorization and placement.
    pub async fn reserve(&self, candidate: &TradeDecision) -> Result<TradeReservation> {
        let mut state = self.state.lock().await;
        if let Some(reason) = self.evaluate(&mut state, candidate).await.reason {
            return Err(GuardError::RiskDenied(reason));
        }
        self.pending_trades.fetch_add(1, Ordering::SeqCst);
        Ok(TradeReservation {
            pending: self.pending_trades.clone(),
        })
    }

    /// Reserved trades still being placed
    pub fn pending_trades(&self) -> u32 {
        self.pending_trades.load(Ordering::SeqCst)
    }

    async fn evaluate(&self, state: &mut RiskState, candidate: &TradeDecision) -> Authorization {
        if self.kill_switch.is_engaged() {
            return self.deny(candidate, DenyReason::KillSwitch);
        }

        let now = self.clock.now();
        if self.roll_day(state) || !self.persist_healthy.load(Ordering::SeqCst) {
            // Best effort; the health flag decides below
            let _ = self.persist(state).await;
        }
        if !self.persist_healthy.load(Ordering::SeqCst) {
            return self.deny(candidate, DenyReason::StateUnpersisted);
        }

        let bankroll = self.ledger.current_bankroll().await;

        let trip = if state.daily_pnl <= -self.config.max_daily_loss
            || state.is_tripped_for(TripReason::DailyLossLimit)
        {
            Some(TripReason::DailyLossLimit)
        } else if state.consecutive_losses >= self.config.max_consecutive_losses
            || state.is_tripped_for(TripReason::ConsecutiveLosses)
        {
            Some(TripReason::ConsecutiveLosses)
        } else if bankroll < self.config.min_bankroll
            || state.is_tripped_for(TripReason::MinBankroll)
        {
            Some(TripReason::MinBankroll)
        } else {
            None
        };

        if let Some(reason) = trip {
            if self.trip(state, reason, bankroll) {
                let _ = self.persist(state).await;
            }
            return self.deny(candidate, reason.into());
        }

        if state.is_tripped_for(TripReason::Manual) {
            return self.deny(candidate, DenyReason::ManualHalt);
        }
        if state.in_cooldown(now) {
            return self.deny(candidate, DenyReason::Cooldown);
        }
        let pending = self.pending_trades.load(Ordering::SeqCst);
        if state.trades_today.saturating_add(pending) >= self.config.max_daily_trades {
            return self.deny(candidate, DenyReason::DailyTradeCap);
        }

        debug!(key = %candidate.market_key(), "authorized");
        Authorization::allow()
    }

    /// Apply a settled trade.
    ///
    /// A loss extends the streak and starts a cooldown, a win ends the streak,
    /// break-even leaves both untouched.
    pub async fn record_outcome(&self, outcome: &TradeOutcome) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        self.roll_day(&mut state);

        state.daily_pnl += outcome.realized_pnl;
        if outcome.is_loss() {
            state.consecutive_losses += 1;
            state.cooldown_until = Some(now + self.config.cooldown());
        } else if outcome.is_win() {
            state.consecutive_losses = 0;
        }

        info!(
            order_id = %outcome.order_id,
            pnl = %outcome.realized_pnl,
            daily_pnl = %state.daily_pnl,
            consecutive_losses = state.consecutive_losses,
            "outcome recorded"
        );

        let bankroll = self.ledger.current_bankroll().await;
        if state.daily_pnl <= -self.config.max_daily_loss {
            self.trip(&mut state, TripReason::DailyLossLimit, bankroll);
        }
        if state.consecutive_losses >= self.config.max_consecutive_losses {
            self.trip(&mut state, TripReason::ConsecutiveLosses, bankroll);
        }
        if bankroll < self.config.min_bankroll {
            self.trip(&mut state, TripReason::MinBankroll, bankroll);
        }

        self.persist(&mut state).await
    }

    /// Count a filled or resting order against today's trade cap
    pub async fn record_trade_opened(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.roll_day(&mut state);
        state.trades_today += 1;
        debug!(
            trades_today = state.trades_today,
            max_daily_trades = self.config.max_daily_trades,
            "trade counted"
        );
        self.persist(&mut state).await
    }

    /// Start a new trading day now, regardless of the calendar
    pub async fn reset_daily(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.apply_daily_reset(&mut state);
        self.persist(&mut state).await
    }

    /// Clear every trip, the loss streak and any cooldown. Daily P&L is kept.
    pub async fn operator_reset(&self, operator: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        warn!(
            operator,
            previous_trip = ?state.trip_reason,
            consecutive_losses = state.consecutive_losses,
            "operator reset of circuit breaker"
        );
        state.tripped = false;
        state.trip_reason = None;
        state.consecutive_losses = 0;
        state.cooldown_until = None;
        self.persist(&mut state).await
    }

    /// Halt new orders until an operator reset
    pub async fn manual_trip(&self, reason: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let bankroll = self.ledger.current_bankroll().await;
        if self.trip(&mut state, TripReason::Manual, bankroll) {
            warn!(note = reason, "manual halt engaged");
        }
        self.persist(&mut state).await
    }

    pub async fn status(&self) -> RiskState {
        self.state.lock().await.clone()
    }

    pub async fn breaker_state(&self) -> BreakerState {
        let now = self.clock.now();
        self.state.lock().await.breaker_state(now)
    }

    pub fn is_persist_healthy(&self) -> bool {
        self.persist_healthy.load(Ordering::SeqCst)
    }

    fn deny(&self, candidate: &TradeDecision, reason: DenyReason) -> Authorization {
        info!(key = %candidate.market_key(), reason = %reason, "authorization denied");
        Authorization::deny(reason)
    }

    /// Lazy calendar-day rollover. Returns true when a reset happened.
    fn roll_day(&self, state: &mut RiskState) -> bool {
        let today = self.clock.today();
        if state.day_start == today {
            return false;
        }
        info!(from = %state.day_start, to = %today, "new trading day");
        self.apply_daily_reset(state);
        true
    }

    fn apply_daily_reset(&self, state: &mut RiskState) {
        state.daily_pnl = Decimal::ZERO;
        state.trades_today = 0;
        state.day_start = self.clock.today();

        // The loss streak carries over; only a win ends it. A streak still at
        // the limit trips again on the next authorization.
        if let Some(reason) = state.trip_reason.filter(|r| r.clears_daily()) {
            state.tripped = false;
            state.trip_reason = None;
            info!(reason = %reason, "daily reset cleared circuit breaker");
        }
    }

    /// Set the trip flag. Returns true only on a transition, so each trip is
    /// logged once. Trips that survive the day are never replaced by ones that
    /// do not.
    fn trip(&self, state: &mut RiskState, reason: TripReason, bankroll: Decimal) -> bool {
        if let Some(existing) = state.trip_reason.filter(|_| state.tripped) {
            if existing == reason || !existing.clears_daily() || reason.clears_daily() {
                return false;
            }
        }

        state.tripped = true;
        state.trip_reason = Some(reason);
        error!(
            reason = %reason,
            daily_pnl = %state.daily_pnl,
            consecutive_losses = state.consecutive_losses,
            bankroll = %bankroll,
            "CIRCUIT BREAKER TRIPPED"
        );
        true
    }

    async fn persist(&self, state: &mut RiskState) -> Result<()> {
        state.updated_at = self.clock.now();
        match self.store.save(state).await {
            Ok(()) => {
                if !self.persist_healthy.swap(true, Ordering::SeqCst) {
                    info!("risk state persistence recovered");
                }
                Ok(())
            }
            Err(e) => {
                if self.persist_healthy.swap(false, Ordering::SeqCst) {
                    error!(error = %e, "risk state persistence failed, blocking new orders");
                }
                Err(GuardError::Persistence(e.to_string()))
            }
        }
    }
}
