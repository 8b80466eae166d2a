//! Paper exchange
//!
//! In-memory exchange for dry runs. Buy orders fill immediately at their limit
//! price while cash lasts; fill-or-kill orders that cannot be covered are
//! killed, resting orders that cannot be covered stay open until cancelled.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::ExchangeClient;
use crate::domain::{BalanceSnapshot, OrderAck, OrderRequest, OrderSide, OrderStatus, TradeFill};
use crate::error::{GuardError, Result};

pub struct PaperExchange {
    cash: Mutex<Decimal>,
    orders: DashMap<String, OrderAck>,
    client_ids: DashMap<String, String>,
    trades: Mutex<Vec<TradeFill>>,
}

impl PaperExchange {
    pub fn new(starting_cash: Decimal) -> Self {
        Self {
            cash: Mutex::new(starting_cash),
            orders: DashMap::new(),
            client_ids: DashMap::new(),
            trades: Mutex::new(Vec::new()),
        }
    }

    fn resolve(&self, order_id: &str) -> Option<String> {
        if self.orders.contains_key(order_id) {
            return Some(order_id.to_string());
        }
        self.client_ids.get(order_id).map(|id| id.value().clone())
    }

    fn record_fill(&self, order_id: &str, request: &OrderRequest) {
        let fill = TradeFill {
            trade_id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            price: request.limit_price,
            size: request.size,
            timestamp: Utc::now(),
            fee: Decimal::ZERO,
        };
        self.trades
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(fill);
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck> {
        if self.client_ids.contains_key(&request.client_order_id) {
            return Err(GuardError::OrderRejected(format!(
                "duplicate client order id {}",
                request.client_order_id
            )));
        }

        let order_id = format!("paper-{}", Uuid::new_v4());
        let notional = request.notional();

        let status = {
            let mut cash = self.cash.lock().unwrap_or_else(|e| e.into_inner());
            match request.order_side {
                OrderSide::Buy if *cash >= notional => {
                    *cash -= notional;
                    OrderStatus::Filled
                }
                OrderSide::Buy if request.order_type.can_rest() => OrderStatus::Open,
                OrderSide::Buy => OrderStatus::Cancelled,
                OrderSide::Sell => {
                    *cash += notional;
                    OrderStatus::Filled
                }
            }
        };

        let filled = status == OrderStatus::Filled;
        if filled {
            self.record_fill(&order_id, request);
        }

        let ack = OrderAck {
            order_id: order_id.clone(),
            client_order_id: Some(request.client_order_id.clone()),
            status,
            filled_size: if filled { request.size } else { Decimal::ZERO },
            avg_fill_price: filled.then_some(request.limit_price),
        };

        debug!(order_id = %order_id, status = %status, "paper order placed");
        self.client_ids
            .insert(request.client_order_id.clone(), order_id.clone());
        self.orders.insert(order_id, ack.clone());
        Ok(ack)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<bool> {
        let id = self
            .resolve(order_id)
            .ok_or_else(|| GuardError::OrderNotFound(order_id.to_string()))?;
        let mut entry = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| GuardError::OrderNotFound(order_id.to_string()))?;
        if !entry.status.is_active() {
            return Ok(false);
        }
        entry.status = OrderStatus::Cancelled;
        Ok(true)
    }

    async fn get_order_status(&self, order_id: &str) -> Result<OrderAck> {
        let id = self
            .resolve(order_id)
            .ok_or_else(|| GuardError::OrderNotFound(order_id.to_string()))?;
        self.orders
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| GuardError::OrderNotFound(order_id.to_string()))
    }

    async fn get_trades(&self) -> Result<Vec<TradeFill>> {
        Ok(self
            .trades
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn get_balance(&self, _address: &str) -> Result<BalanceSnapshot> {
        let cash = *self.cash.lock().unwrap_or_else(|e| e.into_inner());
        Ok(BalanceSnapshot {
            available: cash,
            locked: Decimal::ZERO,
        })
    }
}
