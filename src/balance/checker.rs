//! Account funds checks with a short-lived cache
//!
//! A cached balance only approves a request while it is inside its TTL and the
//! request is comfortably below what the cache says is available. Anything
//! closer to the edge forces a fresh fetch. Fetch failures fail closed.

use chrono::Duration as ChronoDuration;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::BalanceConfig;
use crate::domain::{Balance, FundsCheck};
use crate::error::Result;
use crate::exchange::ExchangeClient;
use crate::execution::{CallPacer, RetryPolicy};

pub struct BalanceChecker {
    exchange: Arc<dyn ExchangeClient>,
    policy: RetryPolicy,
    pacer: Arc<CallPacer>,
    clock: Arc<dyn Clock>,
    address: String,
    ttl: ChronoDuration,
    refresh_ratio: Decimal,
    cache: RwLock<Option<Balance>>,
}

impl BalanceChecker {
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        config: &BalanceConfig,
        policy: RetryPolicy,
        pacer: Arc<CallPacer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            exchange,
            policy,
            pacer,
            clock,
            address: config.account_address.clone(),
            ttl: ChronoDuration::seconds(config.cache_ttl_secs as i64),
            refresh_ratio: config.refresh_ratio,
            cache: RwLock::new(None),
        }
    }

    /// Cached balance if fresh, otherwise a fresh fetch. `force` always fetches.
    pub async fn get_balance(&self, force: bool) -> Result<Balance> {
        if !force {
            if let Some(cached) = *self.cache.read().await {
                if cached.is_fresh(self.clock.now()) {
                    return Ok(cached);
                }
            }
        }
        self.refresh().await
    }

    /// Compare `required` against available funds.
    ///
    /// Refetches when the cache is missing or stale, or when `required`
    /// exceeds `refresh_ratio` of the cached available amount.
    pub async fn check_funds(&self, required: Decimal) -> FundsCheck {
        let now = self.clock.now();
        let cached = *self.cache.read().await;

        let balance = match cached {
            Some(balance)
                if balance.is_fresh(now) && required <= balance.available * self.refresh_ratio =>
            {
                balance
            }
            _ => match self.refresh().await {
                Ok(balance) => balance,
                Err(e) => {
                    warn!(required = %required, error = %e, "balance unavailable, failing closed");
                    return FundsCheck::Unknown {
                        reason: e.to_string(),
                    };
                }
            },
        };

        if required <= balance.available {
            FundsCheck::Sufficient {
                required,
                available: balance.available,
            }
        } else {
            debug!(required = %required, available = %balance.available, "insufficient funds");
            FundsCheck::Insufficient {
                required,
                available: balance.available,
            }
        }
    }

    pub async fn has_sufficient(&self, required: Decimal) -> bool {
        self.check_funds(required).await.is_sufficient()
    }

    pub async fn cached(&self) -> Option<Balance> {
        *self.cache.read().await
    }

    /// Drop the cached balance so the next check fetches
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn refresh(&self) -> Result<Balance> {
        let snapshot = self
            .policy
            .call("get_balance", &self.pacer, || {
                self.exchange.get_balance(&self.address)
            })
            .await?;

        let balance = Balance::from_snapshot(snapshot, self.clock.now(), self.ttl);
        debug!(
            available = %balance.available,
            locked = %balance.locked,
            "balance refreshed"
        );
        *self.cache.write().await = Some(balance);
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::BalanceSnapshot;
    use crate::error::GuardError;
    use crate::exchange::MockExchangeClient;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn checker(exchange: MockExchangeClient, clock: Arc<ManualClock>) -> BalanceChecker {
        let policy = RetryPolicy {
            max_attempts: 2,
            call_timeout: Duration::from_secs(5),
            min_wait: Duration::from_millis(10),
            max_wait: Duration::from_millis(20),
            jitter_factor: 0.0,
        };
        BalanceChecker::new(
            Arc::new(exchange),
            &BalanceConfig::default(),
            policy,
            Arc::new(CallPacer::new(Duration::ZERO)),
            clock,
        )
    }

    fn snapshot(available: Decimal) -> BalanceSnapshot {
        BalanceSnapshot {
            available,
            locked: Decimal::ZERO,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_requests_use_cache() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_get_balance()
            .times(1)
            .returning(|_| Ok(snapshot(dec!(100))));

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let checker = checker(exchange, clock);

        assert!(checker.has_sufficient(dec!(10)).await);
        assert!(checker.has_sufficient(dec!(80)).await);
        assert_eq!(checker.cached().await.unwrap().available, dec!(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_request_forces_refresh() {
        let mut exchange = MockExchangeClient::new();
        let mut seq = mockall::Sequence::new();
        exchange
            .expect_get_balance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(snapshot(dec!(100))));
        exchange
            .expect_get_balance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(snapshot(dec!(60))));

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let checker = checker(exchange, clock);

        assert!(checker.has_sufficient(dec!(10)).await);
        // 85 > 80% of the cached 100, the refetch shows only 60
        let check = checker.check_funds(dec!(85)).await;
        assert_eq!(
            check,
            FundsCheck::Insufficient {
                required: dec!(85),
                available: dec!(60)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_fails_closed() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_get_balance()
            .times(2)
            .returning(|_| Err(GuardError::TransientNetwork("rpc down".into())));

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let checker = checker(exchange, clock);

        let check = checker.check_funds(dec!(1)).await;
        assert!(matches!(check, FundsCheck::Unknown { .. }));
        assert!(checker.cached().await.is_none());
    }
}
