use async_trait::async_trait;

use crate::domain::{BalanceSnapshot, OrderAck, OrderRequest, TradeFill};
use crate::error::Result;

/// Downstream exchange seam.
///
/// Implementations map transport failures onto `GuardError::TransientNetwork`
/// / `RateLimited` (retryable) and deliberate refusals onto
/// `GuardError::OrderRejected` / `Validation` (terminal). Deadlines are applied
/// by the caller, not by implementations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck>;

    async fn cancel_order(&self, order_id: &str) -> Result<bool>;

    /// Look up an order by server id or by the client order id it was submitted
    /// with. Unknown ids yield `GuardError::OrderNotFound`.
    async fn get_order_status(&self, order_id: &str) -> Result<OrderAck>;

    async fn get_trades(&self) -> Result<Vec<TradeFill>>;

    async fn get_balance(&self, address: &str) -> Result<BalanceSnapshot>;
}
