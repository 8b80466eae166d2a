//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tradeguard::clock::ManualClock;
use tradeguard::config::{BalanceConfig, ExecutionConfig, RiskConfig};
use tradeguard::domain::{
    BalanceSnapshot, OrderAck, OrderRequest, OrderStatus, OrderType, Side, TradeDecision, TradeFill,
};
use tradeguard::error::{GuardError, Result};
use tradeguard::exchange::ExchangeClient;
use tradeguard::execution::{CallPacer, OrderExecutor, RetryPolicy};
use tradeguard::ledger::MemoryLedger;
use tradeguard::persistence::{MemoryOrderJournal, MemoryStateStore};
use tradeguard::risk::RiskManager;
use tradeguard::safety::MemoryKillSwitch;
use tradeguard::{BalanceChecker, TradePipeline};

/// What the scripted exchange does with the next place call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceStep {
    /// Never answers and never records the order
    Hang,
    /// Records the order, then never answers
    LandThenHang,
    /// Connection-level failure before the order is seen
    Transient,
    /// Deliberate refusal
    Reject,
    /// Accepted and filled at the limit price
    Fill,
    /// Accepted and left resting on the book
    Rest,
}

pub struct ScriptedExchange {
    script: Mutex<VecDeque<PlaceStep>>,
    orders: DashMap<String, OrderAck>,
    available: Mutex<Decimal>,
    balance_down: AtomicBool,
    fill_price: Mutex<Option<Decimal>>,
    pub place_calls: AtomicU32,
    pub balance_calls: AtomicU32,
    pub cancel_calls: AtomicU32,
}

impl ScriptedExchange {
    pub fn new(available: Decimal) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            orders: DashMap::new(),
            available: Mutex::new(available),
            balance_down: AtomicBool::new(false),
            fill_price: Mutex::new(None),
            place_calls: AtomicU32::new(0),
            balance_calls: AtomicU32::new(0),
            cancel_calls: AtomicU32::new(0),
        }
    }

    pub fn script(&self, steps: &[PlaceStep]) {
        self.script.lock().unwrap().extend(steps.iter().copied());
    }

    pub fn set_available(&self, available: Decimal) {
        *self.available.lock().unwrap() = available;
    }

    pub fn set_balance_down(&self, down: bool) {
        self.balance_down.store(down, Ordering::SeqCst);
    }

    /// Fill at this price instead of the limit
    pub fn set_fill_price(&self, price: Decimal) {
        *self.fill_price.lock().unwrap() = Some(price);
    }

    /// Fill a resting order out of band, as a counterparty would
    pub fn fill_resting(&self, client_order_id: &str) {
        if let Some(mut entry) = self.orders.get_mut(client_order_id) {
            entry.status = OrderStatus::Filled;
            entry.filled_size = dec!(20);
            entry.avg_fill_price = Some(dec!(0.45));
        }
    }

    pub fn places(&self) -> u32 {
        self.place_calls.load(Ordering::SeqCst)
    }

    pub fn balance_fetches(&self) -> u32 {
        self.balance_calls.load(Ordering::SeqCst)
    }

    fn ack(&self, request: &OrderRequest, status: OrderStatus) -> OrderAck {
        let filled = status == OrderStatus::Filled;
        let price = self.fill_price.lock().unwrap().unwrap_or(request.limit_price);
        OrderAck {
            order_id: format!("ex-{}", request.client_order_id),
            client_order_id: Some(request.client_order_id.clone()),
            status,
            filled_size: if filled { request.size } else { Decimal::ZERO },
            avg_fill_price: filled.then_some(price),
        }
    }

    fn record(&self, ack: &OrderAck) {
        if let Some(client_id) = &ack.client_order_id {
            self.orders.insert(client_id.clone(), ack.clone());
        }
    }

    fn find(&self, order_id: &str) -> Option<OrderAck> {
        self.orders
            .iter()
            .find(|entry| entry.key() == order_id || entry.order_id == order_id)
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl ExchangeClient for ScriptedExchange {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck> {
        self.place_calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PlaceStep::Fill);

        match step {
            PlaceStep::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(GuardError::Internal("unreachable".into()))
            }
            PlaceStep::LandThenHang => {
                let ack = self.ack(request, OrderStatus::Filled);
                self.record(&ack);
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ack)
            }
            PlaceStep::Transient => Err(GuardError::TransientNetwork("connection reset".into())),
            PlaceStep::Reject => Err(GuardError::OrderRejected("market closed".into())),
            PlaceStep::Fill => {
                let ack = self.ack(request, OrderStatus::Filled);
                self.record(&ack);
                Ok(ack)
            }
            PlaceStep::Rest => {
                let ack = self.ack(request, OrderStatus::Open);
                self.record(&ack);
                Ok(ack)
            }
        }
    }

    async fn cancel_order(&self, order_id: &str) -> Result<bool> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        let ack = self
            .find(order_id)
            .ok_or_else(|| GuardError::OrderNotFound(order_id.to_string()))?;
        if !ack.status.is_active() {
            return Ok(false);
        }
        if let Some(client_id) = &ack.client_order_id {
            if let Some(mut entry) = self.orders.get_mut(client_id) {
                entry.status = OrderStatus::Cancelled;
            }
        }
        Ok(true)
    }

    async fn get_order_status(&self, order_id: &str) -> Result<OrderAck> {
        self.find(order_id)
            .ok_or_else(|| GuardError::OrderNotFound(order_id.to_string()))
    }

    async fn get_trades(&self) -> Result<Vec<TradeFill>> {
        Ok(Vec::new())
    }

    async fn get_balance(&self, _address: &str) -> Result<BalanceSnapshot> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if self.balance_down.load(Ordering::SeqCst) {
            return Err(GuardError::TransientNetwork("balance endpoint down".into()));
        }
        Ok(BalanceSnapshot {
            available: *self.available.lock().unwrap(),
            locked: Decimal::ZERO,
        })
    }
}

pub fn start_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap()
}

pub fn decision(asset: &str, side: Side, size: Decimal, price: Decimal) -> TradeDecision {
    TradeDecision {
        asset: asset.to_string(),
        direction: side,
        confidence: 0.62,
        target_price: price,
        size,
        token_id: format!("{}-{}", asset.to_lowercase(), side.as_str().to_lowercase()),
        order_type: OrderType::FillOrKill,
    }
}

/// Risk limits with the post-loss cooldown disabled, so limit checks can be
/// observed in isolation
pub fn risk_config_without_cooldown() -> RiskConfig {
    RiskConfig {
        cooldown_windows: 0,
        ..RiskConfig::default()
    }
}

pub struct Harness {
    pub exchange: Arc<ScriptedExchange>,
    pub clock: Arc<ManualClock>,
    pub kill_switch: Arc<MemoryKillSwitch>,
    pub journal: Arc<MemoryOrderJournal>,
    pub store: Arc<MemoryStateStore>,
    pub ledger: Arc<MemoryLedger>,
    pub executor: Arc<OrderExecutor>,
    pub balance: Arc<BalanceChecker>,
    pub risk: Arc<RiskManager>,
    pub pipeline: TradePipeline,
}

pub async fn harness(risk_config: RiskConfig, available: Decimal) -> Harness {
    let exchange = Arc::new(ScriptedExchange::new(available));
    let clock = Arc::new(ManualClock::new(start_time()));
    let kill_switch = Arc::new(MemoryKillSwitch::new());
    let journal = Arc::new(MemoryOrderJournal::new());
    let store = Arc::new(MemoryStateStore::new());
    let ledger = Arc::new(MemoryLedger::new(dec!(1000)));

    let execution = ExecutionConfig::default();
    let pacer = Arc::new(CallPacer::from_config(&execution));

    let executor = Arc::new(OrderExecutor::new(
        exchange.clone(),
        &execution,
        pacer.clone(),
        kill_switch.clone(),
        clock.clone(),
        journal.clone(),
    ));
    let balance = Arc::new(BalanceChecker::new(
        exchange.clone(),
        &BalanceConfig::default(),
        RetryPolicy::from_config(&execution),
        pacer,
        clock.clone(),
    ));
    let risk = Arc::new(
        RiskManager::open(
            risk_config,
            store.clone(),
            kill_switch.clone(),
            ledger.clone(),
            clock.clone(),
        )
        .await
        .unwrap(),
    );
    let pipeline = TradePipeline::new(risk.clone(), balance.clone(), executor.clone(), ledger.clone());

    Harness {
        exchange,
        clock,
        kill_switch,
        journal,
        store,
        ledger,
        executor,
        balance,
        risk,
        pipeline,
    }
}
