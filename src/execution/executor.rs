//! Order executor
//!
//! Owns the order lifecycle and every outbound order call. Each place attempt
//! is paced, bounded by the call deadline and, when it fails transiently,
//! reconciled against the exchange by client order id before anything is
//! resubmitted. Every lifecycle transition is journaled.

use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, warn};

use super::{CallPacer, RetryPolicy, SlippageMonitor};
use crate::clock::Clock;
use crate::config::ExecutionConfig;
use crate::domain::{
    Order, OrderAck, OrderRequest, OrderResult, OrderState, OrderStatus, SlippageReport, TradeFill,
};
use crate::error::{GuardError, Result};
use crate::exchange::ExchangeClient;
use crate::persistence::OrderJournal;
use crate::safety::KillSwitch;

pub struct OrderExecutor {
    exchange: Arc<dyn ExchangeClient>,
    policy: RetryPolicy,
    pacer: Arc<CallPacer>,
    kill_switch: Arc<dyn KillSwitch>,
    clock: Arc<dyn Clock>,
    journal: Arc<dyn OrderJournal>,
    slippage: SlippageMonitor,
    fill_confirm_timeout: Duration,
    poll_interval: Duration,
    binary_price_bounds: bool,
    /// Resting orders by client order id
    open_orders: DashMap<String, Order>,
}

impl OrderExecutor {
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        config: &ExecutionConfig,
        pacer: Arc<CallPacer>,
        kill_switch: Arc<dyn KillSwitch>,
        clock: Arc<dyn Clock>,
        journal: Arc<dyn OrderJournal>,
    ) -> Self {
        Self {
            exchange,
            policy: RetryPolicy::from_config(config),
            pacer,
            kill_switch,
            clock,
            journal,
            slippage: SlippageMonitor::new(config.slippage_warn_threshold),
            fill_confirm_timeout: Duration::from_millis(config.fill_confirm_timeout_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            binary_price_bounds: config.binary_price_bounds,
            open_orders: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Place an order and drive it to a reportable state.
    ///
    /// Local validation failures and a kill switch engaged before the first
    /// submission return `Err`. Everything that happens after the first
    /// submission is reported as `Ok(OrderResult)` carrying the final state,
    /// including `TimedOutTerminal` and `Rejected` (a kill switch engaged
    /// between attempts ends the order as `Rejected`).
    ///
    /// `quoted_price` is the price the caller saw before deciding; it defaults
    /// to the limit price for slippage measurement.
    #[instrument(skip(self, request), fields(client_order_id = %request.client_order_id, key = %request.market_key()))]
    pub async fn place_order(
        &self,
        request: OrderRequest,
        quoted_price: Option<Decimal>,
    ) -> Result<OrderResult> {
        let now = self.clock.now();
        let mut order = Order::from_request(&request, now);

        if let Err(e) = request.validate(now, self.binary_price_bounds) {
            warn!(error = %e, "order failed validation");
            order.last_error = Some(e.to_string());
            self.advance(&mut order, OrderState::Rejected).await?;
            self.finalize(order, None).await;
            return Err(e);
        }
        self.advance(&mut order, OrderState::Validated).await?;

        let expected_price = quoted_price.unwrap_or(request.limit_price);

        loop {
            self.pacer.wait_turn().await;
            self.advance(&mut order, OrderState::Submitting).await?;

            // Checked after pacing, right before the call
            if self.kill_switch.is_engaged() {
                warn!(
                    attempts = order.attempts,
                    switch = %self.kill_switch.describe(),
                    "kill switch engaged, order not sent"
                );
                order.last_error = Some(GuardError::KillSwitchActive.to_string());
                self.advance(&mut order, OrderState::Rejected).await?;
                let submitted = order.attempts > 0;
                let result = self.finalize(order, None).await;
                return if submitted {
                    Ok(result)
                } else {
                    Err(GuardError::KillSwitchActive)
                };
            }

            order.attempts += 1;
            debug!(attempt = order.attempts, "submitting order");
            let outcome = self
                .policy
                .timed("place_order", self.exchange.place_order(&request))
                .await;

            let err = match outcome {
                Ok(ack) => return self.handle_ack(order, ack, expected_price).await,
                Err(e) => e,
            };

            order.last_error = Some(err.to_string());

            if !err.is_retryable() {
                warn!(attempt = order.attempts, error = %err, "order rejected");
                self.advance(&mut order, OrderState::Rejected).await?;
                return Ok(self.finalize(order, None).await);
            }

            self.advance(&mut order, OrderState::RetryWait).await?;

            if order.attempts < self.policy.max_attempts {
                let delay = self
                    .policy
                    .backoff_delay(order.attempts, &mut rand::thread_rng());
                warn!(
                    attempt = order.attempts,
                    max_attempts = self.policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "place attempt failed, backing off"
                );
                sleep(delay).await;
            }

            // The failed attempt may still have reached the exchange
            match self.reconcile(&order).await {
                Ok(Some(ack)) => {
                    info!(
                        attempt = order.attempts,
                        exchange_order_id = %ack.order_id,
                        "earlier attempt landed, not resubmitting"
                    );
                    return self.handle_ack(order, ack, expected_price).await;
                }
                Ok(None) if order.attempts < self.policy.max_attempts => continue,
                Ok(None) => {
                    error!(
                        attempts = order.attempts,
                        last_error = %err,
                        "order retries exhausted"
                    );
                }
                Err(status_err) => {
                    error!(
                        attempts = order.attempts,
                        last_error = %err,
                        status_error = %status_err,
                        "order status unresolved after failed attempt, failing closed"
                    );
                    order.last_error = Some(format!("{}; status check: {}", err, status_err));
                }
            }

            self.advance(&mut order, OrderState::TimedOutTerminal).await?;
            return Ok(self.finalize(order, None).await);
        }
    }

    /// Cancel an order. Never gated by the kill switch.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<OrderState> {
        let Some(mut order) = self.take_open_order(order_id) else {
            // Not tracked locally; pass the request straight through
            let cancelled = self
                .policy
                .call("cancel_order", &self.pacer, || {
                    self.exchange.cancel_order(order_id)
                })
                .await?;
            return Ok(if cancelled {
                OrderState::Cancelled
            } else {
                OrderState::CancelFailed
            });
        };

        self.advance(&mut order, OrderState::CancelRequested).await?;
        let remote_id = order.remote_id().to_string();

        let outcome = self
            .policy
            .call("cancel_order", &self.pacer, || {
                self.exchange.cancel_order(&remote_id)
            })
            .await;

        match outcome {
            Ok(true) => {
                info!(order_id = %order.id, "order cancelled");
                self.advance(&mut order, OrderState::Cancelled).await?;
                self.finalize(order, None).await;
                Ok(OrderState::Cancelled)
            }
            Ok(false) => {
                // Refused; it may have filled in the meantime
                match self.fetch_status(&remote_id).await {
                    Ok(ack) if ack.status == OrderStatus::Filled => {
                        info!(order_id = %order.id, "cancel lost race with fill");
                        order.apply_ack(&ack);
                        self.advance(&mut order, OrderState::Filled).await?;
                        self.finalize(order, None).await;
                        Ok(OrderState::Filled)
                    }
                    _ => {
                        warn!(order_id = %order.id, "exchange refused cancel");
                        order.last_error = Some("exchange refused cancel".to_string());
                        self.advance(&mut order, OrderState::CancelFailed).await?;
                        self.open_orders.insert(order.id.clone(), order);
                        Ok(OrderState::CancelFailed)
                    }
                }
            }
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "cancel failed");
                order.last_error = Some(e.to_string());
                self.advance(&mut order, OrderState::CancelFailed).await?;
                self.open_orders.insert(order.id.clone(), order);
                Ok(OrderState::CancelFailed)
            }
        }
    }

    /// Current exchange status of an order, by client or exchange id.
    ///
    /// A tracked resting order that the exchange reports as done is settled
    /// locally as a side effect.
    pub async fn get_order_status(&self, order_id: &str) -> Result<OrderStatus> {
        let tracked_remote = self.find_open_key(order_id).and_then(|key| {
            self.open_orders
                .get(&key)
                .map(|order| order.remote_id().to_string())
        });
        let lookup_id = tracked_remote.as_deref().unwrap_or(order_id);

        let ack = self
            .policy
            .call("get_order_status", &self.pacer, || {
                self.exchange.get_order_status(lookup_id)
            })
            .await?;

        if ack.status.is_terminal() {
            if let Some(mut order) = self.take_open_order(order_id) {
                order.apply_ack(&ack);
                let target = if ack.status == OrderStatus::Filled {
                    OrderState::Filled
                } else {
                    order.last_error = Some(format!("exchange reported {}", ack.status));
                    OrderState::Rejected
                };
                match self.advance(&mut order, target).await {
                    Ok(()) => {
                        self.finalize(order, None).await;
                    }
                    Err(e) => {
                        warn!(order_id = %order.id, error = %e, "cannot settle tracked order");
                        self.open_orders.insert(order.id.clone(), order);
                    }
                }
            }
        }

        Ok(ack.status)
    }

    /// Trade history from the exchange
    pub async fn recent_trades(&self) -> Result<Vec<TradeFill>> {
        self.policy
            .call("get_trades", &self.pacer, || self.exchange.get_trades())
            .await
    }

    /// Track again the resting orders a previous run left on the book, from
    /// the latest journaled snapshot of each order. Returns how many were
    /// restored.
    pub async fn restore_open_orders(&self) -> Result<usize> {
        let mut restored = 0;
        for order in self.journal.load().await? {
            match order.state {
                OrderState::Open | OrderState::CancelFailed => {
                    info!(
                        order_id = %order.id,
                        exchange_order_id = %order.remote_id(),
                        state = %order.state,
                        "restored resting order"
                    );
                    self.open_orders.insert(order.id.clone(), order);
                    restored += 1;
                }
                OrderState::Submitting | OrderState::RetryWait | OrderState::CancelRequested => {
                    warn!(
                        order_id = %order.id,
                        state = %order.state,
                        "order was interrupted mid-call, check it on the exchange"
                    );
                }
                _ => {}
            }
        }
        Ok(restored)
    }

    /// Resting orders placed by this executor that have not been settled
    pub fn open_orders(&self) -> Vec<Order> {
        self.open_orders
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    async fn handle_ack(
        &self,
        mut order: Order,
        ack: OrderAck,
        expected_price: Decimal,
    ) -> Result<OrderResult> {
        order.apply_ack(&ack);

        let ack = if ack.status.is_active() {
            self.wait_for_fill(&order, ack).await
        } else {
            ack
        };
        order.apply_ack(&ack);

        match ack.status {
            OrderStatus::Filled => self.complete_fill(order, expected_price).await,
            OrderStatus::Pending | OrderStatus::Open | OrderStatus::PartiallyFilled => {
                info!(
                    order_id = %order.id,
                    exchange_order_id = %order.remote_id(),
                    filled_size = %order.filled_size,
                    "order resting on book"
                );
                self.advance(&mut order, OrderState::Open).await?;
                let result = OrderResult::from_order(&order, OrderState::Open, None);
                self.open_orders.insert(order.id.clone(), order);
                Ok(result)
            }
            OrderStatus::Cancelled | OrderStatus::Rejected | OrderStatus::Expired => {
                warn!(order_id = %order.id, status = %ack.status, "order not filled");
                order.last_error = Some(format!("exchange reported {}", ack.status));
                self.advance(&mut order, OrderState::Rejected).await?;
                Ok(self.finalize(order, None).await)
            }
        }
    }

    /// Poll a resting order until it leaves the book or the confirm window ends
    async fn wait_for_fill(&self, order: &Order, mut ack: OrderAck) -> OrderAck {
        let deadline = Instant::now() + self.fill_confirm_timeout;
        let remote_id = order.remote_id().to_string();

        while ack.status.is_active() && Instant::now() < deadline {
            sleep(self.poll_interval).await;
            match self.fetch_status(&remote_id).await {
                Ok(latest) => ack = latest,
                Err(e) => debug!(order_id = %order.id, error = %e, "fill poll failed"),
            }
        }
        ack
    }

    async fn complete_fill(&self, mut order: Order, expected_price: Decimal) -> Result<OrderResult> {
        if order.filled_size.is_zero() {
            order.filled_size = order.size;
        }
        if order.avg_fill_price.is_none() {
            order.avg_fill_price = self.fill_price_from_trades(order.remote_id()).await;
        }

        let slippage = order
            .avg_fill_price
            .map(|filled| self.slippage.evaluate(&order.id, expected_price, filled));

        info!(
            order_id = %order.id,
            exchange_order_id = %order.remote_id(),
            attempts = order.attempts,
            filled_size = %order.filled_size,
            avg_fill_price = ?order.avg_fill_price,
            "order filled"
        );
        order.last_error = None;
        self.advance(&mut order, OrderState::Filled).await?;
        Ok(self.finalize(order, slippage).await)
    }

    /// Size-weighted price of the trades recorded against `remote_id`
    async fn fill_price_from_trades(&self, remote_id: &str) -> Option<Decimal> {
        let trades = match self.recent_trades().await {
            Ok(trades) => trades,
            Err(e) => {
                warn!(order_id = remote_id, error = %e, "could not load trades for fill price");
                return None;
            }
        };
        weighted_fill_price(&trades, remote_id)
    }

    /// One status lookup by client order id, used between place attempts.
    /// `Ok(None)` means the exchange has never seen the order.
    async fn reconcile(&self, order: &Order) -> Result<Option<OrderAck>> {
        match self.fetch_status(&order.id).await {
            Ok(ack) => Ok(Some(ack)),
            Err(GuardError::OrderNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_status(&self, order_id: &str) -> Result<OrderAck> {
        self.pacer.wait_turn().await;
        self.policy
            .timed("get_order_status", self.exchange.get_order_status(order_id))
            .await
    }

    /// Move the order to `target` and journal the new snapshot. A journal
    /// failure is logged and does not undo the transition.
    async fn advance(&self, order: &mut Order, target: OrderState) -> Result<()> {
        order.transition(target, self.clock.now())?;
        if let Err(e) = self.journal.append(order).await {
            error!(order_id = %order.id, state = %target, error = %e, "failed to journal order");
        }
        Ok(())
    }

    /// Build the result of a terminal (already journaled) order, then close it
    async fn finalize(&self, mut order: Order, slippage: Option<SlippageReport>) -> OrderResult {
        let result = OrderResult::from_order(&order, order.state, slippage);

        if let Err(e) = order.transition(OrderState::Closed, self.clock.now()) {
            debug!(order_id = %order.id, error = %e, "order left unclosed");
        }
        result
    }

    fn find_open_key(&self, order_id: &str) -> Option<String> {
        if self.open_orders.contains_key(order_id) {
            return Some(order_id.to_string());
        }
        self.open_orders
            .iter()
            .find(|entry| entry.exchange_order_id.as_deref() == Some(order_id))
            .map(|entry| entry.key().clone())
    }

    fn take_open_order(&self, order_id: &str) -> Option<Order> {
        let key = self.find_open_key(order_id)?;
        self.open_orders.remove(&key).map(|(_, order)| order)
    }
}

fn weighted_fill_price(trades: &[TradeFill], order_id: &str) -> Option<Decimal> {
    let (notional, size) = trades
        .iter()
        .filter(|t| t.order_id == order_id)
        .fold((Decimal::ZERO, Decimal::ZERO), |(n, s), t| {
            (n + t.price * t.size, s + t.size)
        });
    (size > Decimal::ZERO).then(|| notional / size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::domain::{OrderType, Side};
    use crate::exchange::MockExchangeClient;
    use crate::persistence::MemoryOrderJournal;
    use crate::safety::MemoryKillSwitch;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Harness {
        executor: OrderExecutor,
        kill_switch: Arc<MemoryKillSwitch>,
        journal: Arc<MemoryOrderJournal>,
    }

    fn harness(exchange: MockExchangeClient) -> Harness {
        let pacer = Arc::new(CallPacer::from_config(&ExecutionConfig::default()));
        harness_with_pacer(exchange, pacer)
    }

    fn harness_with_pacer(exchange: MockExchangeClient, pacer: Arc<CallPacer>) -> Harness {
        let config = ExecutionConfig::default();
        let kill_switch = Arc::new(MemoryKillSwitch::new());
        let journal = Arc::new(MemoryOrderJournal::new());
        let executor = OrderExecutor::new(
            Arc::new(exchange),
            &config,
            pacer,
            kill_switch.clone(),
            Arc::new(SystemClock),
            journal.clone(),
        );
        Harness {
            executor,
            kill_switch,
            journal,
        }
    }

    fn request() -> OrderRequest {
        OrderRequest::buy("BTC", "tok-up", Side::Up, dec!(20), dec!(0.50), OrderType::FillOrKill)
    }

    fn filled_ack(price: Option<Decimal>) -> OrderAck {
        OrderAck {
            order_id: "ex-1".into(),
            client_order_id: None,
            status: OrderStatus::Filled,
            filled_size: dec!(20),
            avg_fill_price: price,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let mut exchange = MockExchangeClient::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        exchange.expect_place_order().times(3).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(GuardError::TransientNetwork("reset by peer".into()))
            } else {
                Ok(filled_ack(Some(dec!(0.50))))
            }
        });
        exchange
            .expect_get_order_status()
            .times(2)
            .returning(|id| Err(GuardError::OrderNotFound(id.to_string())));

        let h = harness(exchange);
        let result = h.executor.place_order(request(), None).await.unwrap();

        assert_eq!(result.state, OrderState::Filled);
        assert_eq!(result.attempts, 3);
        assert!(result.filled);
        assert_eq!(h.journal.orders().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_finds_landed_order() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_place_order()
            .times(1)
            .returning(|_| Err(GuardError::TransientNetwork("response lost".into())));
        exchange
            .expect_get_order_status()
            .times(1)
            .returning(|_| Ok(filled_ack(Some(dec!(0.50)))));

        let h = harness(exchange);
        let result = h.executor.place_order(request(), None).await.unwrap();

        assert_eq!(result.state, OrderState::Filled);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.order_id.as_deref(), Some("ex-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_status_fails_closed() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_place_order()
            .times(1)
            .returning(|_| Err(GuardError::RateLimited("429".into())));
        exchange
            .expect_get_order_status()
            .times(1)
            .returning(|_| Err(GuardError::TransientNetwork("status down".into())));

        let h = harness(exchange);
        let result = h.executor.place_order(request(), None).await.unwrap();

        assert_eq!(result.state, OrderState::TimedOutTerminal);
        assert_eq!(result.attempts, 1);
        assert!(result.error.unwrap().contains("status check"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_is_not_retried() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_place_order()
            .times(1)
            .returning(|_| Err(GuardError::OrderRejected("not enough balance".into())));

        let h = harness(exchange);
        let result = h.executor.place_order(request(), None).await.unwrap();

        assert_eq!(result.state, OrderState::Rejected);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_request_never_reaches_exchange() {
        let mut exchange = MockExchangeClient::new();
        exchange.expect_place_order().never();

        let h = harness(exchange);
        let mut bad = request();
        bad.size = Decimal::ZERO;

        let err = h.executor.place_order(bad, None).await.unwrap_err();
        assert!(matches!(err, GuardError::Validation(_)));
        assert_eq!(h.journal.orders()[0].state, OrderState::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_switch_blocks_place_but_not_cancel() {
        let mut exchange = MockExchangeClient::new();
        exchange.expect_place_order().never();
        exchange
            .expect_cancel_order()
            .times(1)
            .returning(|_| Ok(true));

        let h = harness(exchange);
        h.kill_switch.engage();

        let err = h.executor.place_order(request(), None).await.unwrap_err();
        assert!(matches!(err, GuardError::KillSwitchActive));

        let state = h.executor.cancel_order("ex-9").await.unwrap();
        assert_eq!(state, OrderState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_switch_engaged_while_waiting_for_pacer() {
        let mut exchange = MockExchangeClient::new();
        exchange.expect_place_order().never();

        let pacer = Arc::new(CallPacer::new(Duration::from_millis(100)));
        let h = harness_with_pacer(exchange, pacer.clone());
        // Another caller just used the slot
        pacer.wait_turn().await;

        let engage = async {
            sleep(Duration::from_millis(50)).await;
            h.kill_switch.engage();
        };
        let (placed, ()) = tokio::join!(h.executor.place_order(request(), None), engage);

        assert!(matches!(placed, Err(GuardError::KillSwitchActive)));
        let journaled = h.journal.orders();
        assert_eq!(journaled[0].state, OrderState::Rejected);
        assert_eq!(journaled[0].attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_switch_between_attempts_ends_order() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_place_order()
            .times(1)
            .returning(|_| Err(GuardError::TransientNetwork("connection reset".into())));
        exchange
            .expect_get_order_status()
            .times(1)
            .returning(|id| Err(GuardError::OrderNotFound(id.to_string())));

        let h = harness(exchange);
        let engage = async {
            // Lands inside the first backoff
            sleep(Duration::from_millis(200)).await;
            h.kill_switch.engage();
        };
        let (placed, ()) = tokio::join!(h.executor.place_order(request(), None), engage);

        let result = placed.unwrap();
        assert_eq!(result.state, OrderState::Rejected);
        assert_eq!(result.attempts, 1);
        assert!(result.error.unwrap().contains("Kill switch"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_transition_is_journaled() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_place_order()
            .returning(|_| Ok(filled_ack(Some(dec!(0.50)))));

        let h = harness(exchange);
        h.executor.place_order(request(), None).await.unwrap();

        let states: Vec<OrderState> = h.journal.records().iter().map(|o| o.state).collect();
        assert_eq!(
            states,
            vec![OrderState::Validated, OrderState::Submitting, OrderState::Filled]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_price_from_trades_and_slippage() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_place_order()
            .returning(|_| Ok(filled_ack(None)));
        exchange.expect_get_trades().returning(|| {
            let fill = |price, size| TradeFill {
                trade_id: uuid::Uuid::new_v4().to_string(),
                order_id: "ex-1".into(),
                price,
                size,
                timestamp: Utc::now(),
                fee: Decimal::ZERO,
            };
            Ok(vec![fill(dec!(0.50), dec!(10)), fill(dec!(0.54), dec!(10))])
        });

        let h = harness(exchange);
        let result = h
            .executor
            .place_order(request(), Some(dec!(0.50)))
            .await
            .unwrap();

        assert_eq!(result.filled_price, Some(dec!(0.52)));
        let slippage = result.slippage.unwrap();
        assert!(slippage.exceeded);
        assert_eq!(slippage.slippage_pct, dec!(0.04));
        // The fill stands
        assert_eq!(result.state, OrderState::Filled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resting_order_tracked_then_cancelled() {
        let mut exchange = MockExchangeClient::new();
        let open = OrderAck {
            order_id: "ex-7".into(),
            client_order_id: None,
            status: OrderStatus::Open,
            filled_size: Decimal::ZERO,
            avg_fill_price: None,
        };
        let polled = open.clone();
        exchange
            .expect_place_order()
            .returning(move |_| Ok(open.clone()));
        exchange
            .expect_get_order_status()
            .returning(move |_| Ok(polled.clone()));
        exchange
            .expect_cancel_order()
            .times(1)
            .returning(|id| Ok(id == "ex-7"));

        let h = harness(exchange);
        let mut resting = request();
        resting.order_type = OrderType::GoodTilCancelled;
        let client_id = resting.client_order_id.clone();

        let result = h.executor.place_order(resting, None).await.unwrap();
        assert_eq!(result.state, OrderState::Open);
        assert_eq!(h.executor.open_orders().len(), 1);

        let state = h.executor.cancel_order(&client_id).await.unwrap();
        assert_eq!(state, OrderState::Cancelled);
        assert!(h.executor.open_orders().is_empty());
        assert_eq!(h.journal.orders()[0].state, OrderState::Cancelled);
    }

    #[test]
    fn test_weighted_fill_price_ignores_other_orders() {
        let now = Utc::now();
        let trade = |order: &str, price, size| TradeFill {
            trade_id: "t".into(),
            order_id: order.into(),
            price,
            size,
            timestamp: now,
            fee: Decimal::ZERO,
        };
        let trades = vec![
            trade("a", dec!(0.40), dec!(30)),
            trade("a", dec!(0.60), dec!(10)),
            trade("b", dec!(0.90), dec!(100)),
        ];
        assert_eq!(weighted_fill_price(&trades, "a"), Some(dec!(0.45)));
        assert_eq!(weighted_fill_price(&trades, "c"), None);
    }
}
