use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{MarketKey, Side, SlippageReport};
use crate::error::{GuardError, Result};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type / time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderType {
    /// Fill Or Kill
    FillOrKill,
    /// Good Till Cancelled
    GoodTilCancelled,
    /// Good Till Date
    GoodTilDate { expires_at: DateTime<Utc> },
}

impl OrderType {
    pub fn code(&self) -> &'static str {
        match self {
            OrderType::FillOrKill => "FOK",
            OrderType::GoodTilCancelled => "GTC",
            OrderType::GoodTilDate { .. } => "GTD",
        }
    }

    /// Whether an accepted order of this type may rest on the book
    pub fn can_rest(&self) -> bool {
        !matches!(self, OrderType::FillOrKill)
    }
}

impl Default for OrderType {
    fn default() -> Self {
        OrderType::FillOrKill
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Order status as reported by the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Accepted but not yet on the book
    Pending,
    /// Resting on the book
    Open,
    /// Order partially filled
    PartiallyFilled,
    /// Order fully filled
    Filled,
    /// Order cancelled
    Cancelled,
    /// Order rejected by exchange
    Rejected,
    /// Order expired
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Open | OrderStatus::PartiallyFilled
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Open => "OPEN",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
        };
        write!(f, "{}", s)
    }
}

/// Local order lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Created,
    Validated,
    Submitting,
    RetryWait,
    Open,
    Filled,
    Rejected,
    TimedOutTerminal,
    CancelRequested,
    Cancelled,
    CancelFailed,
    Closed,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Created => "CREATED",
            OrderState::Validated => "VALIDATED",
            OrderState::Submitting => "SUBMITTING",
            OrderState::RetryWait => "RETRY_WAIT",
            OrderState::Open => "OPEN",
            OrderState::Filled => "FILLED",
            OrderState::Rejected => "REJECTED",
            OrderState::TimedOutTerminal => "TIMED_OUT_TERMINAL",
            OrderState::CancelRequested => "CANCEL_REQUESTED",
            OrderState::Cancelled => "CANCELLED",
            OrderState::CancelFailed => "CANCEL_FAILED",
            OrderState::Closed => "CLOSED",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: OrderState) -> bool {
        use OrderState::*;

        match (self, target) {
            // Validation
            (Created, Validated) => true,
            (Created, Rejected) => true,

            // Kill switch may refuse before the first submit
            (Validated, Submitting) => true,
            (Validated, Rejected) => true,

            // Submission outcomes
            (Submitting, Filled) => true,
            (Submitting, Open) => true,
            (Submitting, Rejected) => true,
            (Submitting, RetryWait) => true,
            (Submitting, TimedOutTerminal) => true,

            // Reconciliation during retry wait may discover the prior attempt landed
            (RetryWait, Submitting) => true,
            (RetryWait, Filled) => true,
            (RetryWait, Open) => true,
            (RetryWait, Rejected) => true,
            (RetryWait, TimedOutTerminal) => true,

            // Resting orders
            (Open, Filled) => true,
            (Open, CancelRequested) => true,
            (Open, Rejected) => true,

            // Cancel path
            (CancelRequested, Cancelled) => true,
            (CancelRequested, CancelFailed) => true,
            (CancelRequested, Filled) => true,
            (CancelFailed, CancelRequested) => true,
            (CancelFailed, Filled) => true,
            (CancelFailed, Rejected) => true,

            // Terminal states are closed once journaled
            (Filled, Closed) => true,
            (Rejected, Closed) => true,
            (TimedOutTerminal, Closed) => true,
            (Cancelled, Closed) => true,

            _ => false,
        }
    }

    /// Terminal outcome of a lifecycle (before it is closed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Filled
                | OrderState::Rejected
                | OrderState::TimedOutTerminal
                | OrderState::Cancelled
                | OrderState::Closed
        )
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order request (what we want the exchange to do)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: String,
    pub asset: String,
    pub token_id: String,
    pub market_side: Side,
    pub order_side: OrderSide,
    pub size: Decimal,
    pub limit_price: Decimal,
    pub order_type: OrderType,
}

impl OrderRequest {
    pub fn buy(
        asset: impl Into<String>,
        token_id: impl Into<String>,
        market_side: Side,
        size: Decimal,
        price: Decimal,
        order_type: OrderType,
    ) -> Self {
        Self {
            client_order_id: Uuid::new_v4().to_string(),
            asset: asset.into(),
            token_id: token_id.into(),
            market_side,
            order_side: OrderSide::Buy,
            size,
            limit_price: price,
            order_type,
        }
    }

    pub fn sell(
        asset: impl Into<String>,
        token_id: impl Into<String>,
        market_side: Side,
        size: Decimal,
        price: Decimal,
        order_type: OrderType,
    ) -> Self {
        Self {
            order_side: OrderSide::Sell,
            ..Self::buy(asset, token_id, market_side, size, price, order_type)
        }
    }

    /// Cash required to fill the whole order at its limit
    pub fn notional(&self) -> Decimal {
        self.size * self.limit_price
    }

    pub fn market_key(&self) -> MarketKey {
        MarketKey::new(self.asset.clone(), self.market_side)
    }

    /// Local parameter checks. Failures are terminal.
    ///
    /// With `binary_price_bounds` the limit must be a probability price in (0, 1].
    pub fn validate(&self, now: DateTime<Utc>, binary_price_bounds: bool) -> Result<()> {
        if self.token_id.trim().is_empty() {
            return Err(GuardError::Validation("token_id is empty".to_string()));
        }
        if self.size <= Decimal::ZERO {
            return Err(GuardError::Validation(format!(
                "size must be positive, got {}",
                self.size
            )));
        }
        if self.limit_price <= Decimal::ZERO {
            return Err(GuardError::Validation(format!(
                "limit price must be positive, got {}",
                self.limit_price
            )));
        }
        if binary_price_bounds && self.limit_price > Decimal::ONE {
            return Err(GuardError::Validation(format!(
                "limit price {} outside (0, 1]",
                self.limit_price
            )));
        }
        if let OrderType::GoodTilDate { expires_at } = self.order_type {
            if expires_at <= now {
                return Err(GuardError::Validation(format!(
                    "GTD expiry {} is not in the future",
                    expires_at
                )));
            }
        }
        Ok(())
    }
}

/// Exchange response to a place or status call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    #[serde(default)]
    pub client_order_id: Option<String>,
    pub status: OrderStatus,
    #[serde(default)]
    pub filled_size: Decimal,
    #[serde(default)]
    pub avg_fill_price: Option<Decimal>,
}

/// Trade history entry from the exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeFill {
    pub trade_id: String,
    pub order_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub fee: Decimal,
}

/// Order (tracked by the executor)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub exchange_order_id: Option<String>,
    pub asset: String,
    pub token_id: String,
    pub market_side: Side,
    pub order_side: OrderSide,
    pub size: Decimal,
    pub limit_price: Decimal,
    pub order_type: OrderType,
    pub state: OrderState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub filled_size: Decimal,
    pub avg_fill_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn from_request(request: &OrderRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: request.client_order_id.clone(),
            exchange_order_id: None,
            asset: request.asset.clone(),
            token_id: request.token_id.clone(),
            market_side: request.market_side,
            order_side: request.order_side,
            size: request.size,
            limit_price: request.limit_price,
            order_type: request.order_type,
            state: OrderState::Created,
            attempts: 0,
            last_error: None,
            filled_size: Decimal::ZERO,
            avg_fill_price: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `target`, rejecting transitions the lifecycle does not allow
    pub fn transition(&mut self, target: OrderState, now: DateTime<Utc>) -> Result<()> {
        if self.state == target {
            return Ok(());
        }
        if !self.state.can_transition_to(target) {
            return Err(GuardError::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        self.state = target;
        self.updated_at = now;
        Ok(())
    }

    /// Adopt what the exchange reports about this order
    pub fn apply_ack(&mut self, ack: &OrderAck) {
        self.exchange_order_id = Some(ack.order_id.clone());
        self.filled_size = ack.filled_size;
        if ack.avg_fill_price.is_some() {
            self.avg_fill_price = ack.avg_fill_price;
        }
    }

    /// The id the exchange knows this order by (server id once assigned)
    pub fn remote_id(&self) -> &str {
        self.exchange_order_id.as_deref().unwrap_or(&self.id)
    }
}

/// Result of a place-order call, reported to the caller for every outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub client_order_id: String,
    pub order_id: Option<String>,
    pub state: OrderState,
    pub filled: bool,
    pub filled_price: Option<Decimal>,
    pub filled_size: Decimal,
    pub attempts: u32,
    pub slippage: Option<SlippageReport>,
    pub error: Option<String>,
}

impl OrderResult {
    pub fn from_order(order: &Order, state: OrderState, slippage: Option<SlippageReport>) -> Self {
        Self {
            client_order_id: order.id.clone(),
            order_id: order.exchange_order_id.clone(),
            state,
            filled: state == OrderState::Filled,
            filled_price: order.avg_fill_price,
            filled_size: order.filled_size,
            attempts: order.attempts,
            slippage,
            error: order.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn request() -> OrderRequest {
        OrderRequest::buy(
            "BTC",
            "token-up",
            Side::Up,
            dec!(100),
            dec!(0.45),
            OrderType::FillOrKill,
        )
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let now = Utc::now();
        assert!(request().validate(now, true).is_ok());

        let mut bad = request();
        bad.size = Decimal::ZERO;
        assert!(matches!(bad.validate(now, true), Err(GuardError::Validation(_))));

        let mut bad = request();
        bad.limit_price = dec!(1.20);
        assert!(bad.validate(now, true).is_err());
        assert!(bad.validate(now, false).is_ok());

        let mut bad = request();
        bad.order_type = OrderType::GoodTilDate {
            expires_at: now - Duration::seconds(1),
        };
        assert!(bad.validate(now, true).is_err());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let now = Utc::now();
        let mut order = Order::from_request(&request(), now);

        order.transition(OrderState::Validated, now).unwrap();
        order.transition(OrderState::Submitting, now).unwrap();
        order.transition(OrderState::RetryWait, now).unwrap();
        order.transition(OrderState::Submitting, now).unwrap();
        order.transition(OrderState::Filled, now).unwrap();
        order.transition(OrderState::Closed, now).unwrap();

        let err = order.transition(OrderState::Submitting, now).unwrap_err();
        assert!(matches!(err, GuardError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_cancel_path() {
        assert!(OrderState::Open.can_transition_to(OrderState::CancelRequested));
        assert!(OrderState::CancelRequested.can_transition_to(OrderState::Cancelled));
        assert!(OrderState::CancelRequested.can_transition_to(OrderState::CancelFailed));
        assert!(!OrderState::Created.can_transition_to(OrderState::CancelRequested));
        assert!(!OrderState::Cancelled.can_transition_to(OrderState::Open));
    }

    #[test]
    fn test_sell_keeps_parameters() {
        let sell = OrderRequest::sell(
            "ETH",
            "token-down",
            Side::Down,
            dec!(10),
            dec!(0.60),
            OrderType::GoodTilCancelled,
        );
        assert_eq!(sell.order_side, OrderSide::Sell);
        assert_eq!(sell.notional(), dec!(6.00));
        assert_eq!(sell.market_key(), MarketKey::new("ETH", Side::Down));
    }
}
