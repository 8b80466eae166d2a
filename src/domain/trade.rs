use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{MarketKey, OrderRequest, OrderType, Side};

/// Decision tuple handed over by the strategy layer.
///
/// Only `size` and `target_price` are interpreted; `confidence` is carried
/// through for logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeDecision {
    pub asset: String,
    pub direction: Side,
    pub confidence: f64,
    pub target_price: Decimal,
    pub size: Decimal,
    pub token_id: String,
    #[serde(default)]
    pub order_type: OrderType,
}

impl TradeDecision {
    pub fn market_key(&self) -> MarketKey {
        MarketKey::new(self.asset.clone(), self.direction)
    }

    /// Entering a position buys the token of the chosen direction
    pub fn to_order_request(&self) -> OrderRequest {
        OrderRequest::buy(
            self.asset.clone(),
            self.token_id.clone(),
            self.direction,
            self.size,
            self.target_price,
            self.order_type,
        )
    }
}

/// Relative deviation of the realized price from the expected price
pub fn slippage_pct(expected: Decimal, filled: Decimal) -> Decimal {
    if expected.is_zero() {
        return Decimal::ZERO;
    }
    ((filled - expected) / expected).abs()
}

/// Post-fill price comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlippageReport {
    pub expected_price: Decimal,
    pub filled_price: Decimal,
    pub slippage_pct: Decimal,
    pub exceeded: bool,
}

/// Settled result of one order, fed to the risk manager and the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub order_id: String,
    pub realized_pnl: Decimal,
    pub filled_price: Decimal,
    pub expected_price: Decimal,
    pub slippage_pct: Decimal,
    pub settled_at: DateTime<Utc>,
}

impl TradeOutcome {
    pub fn new(
        order_id: impl Into<String>,
        realized_pnl: Decimal,
        filled_price: Decimal,
        expected_price: Decimal,
        settled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            realized_pnl,
            filled_price,
            expected_price,
            slippage_pct: slippage_pct(expected_price, filled_price),
            settled_at,
        }
    }

    pub fn is_loss(&self) -> bool {
        self.realized_pnl < Decimal::ZERO
    }

    pub fn is_win(&self) -> bool {
        self.realized_pnl > Decimal::ZERO
    }
}
