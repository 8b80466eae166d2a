use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Raw funds figures as returned by the exchange
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub available: Decimal,
    pub locked: Decimal,
}

/// Cached account funds. Replaced wholesale on refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Balance {
    pub available: Decimal,
    pub locked: Decimal,
    pub total: Decimal,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl Balance {
    pub fn from_snapshot(snapshot: BalanceSnapshot, fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            available: snapshot.available,
            locked: snapshot.locked,
            total: snapshot.available + snapshot.locked,
            fetched_at,
            ttl,
        }
    }

    /// A balance is only trusted strictly inside its ttl
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < self.ttl
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }
}

/// Result of a funds check. `Unknown` is never treated as sufficient.
#[derive(Debug, Clone, PartialEq)]
pub enum FundsCheck {
    Sufficient { required: Decimal, available: Decimal },
    Insufficient { required: Decimal, available: Decimal },
    Unknown { reason: String },
}

impl FundsCheck {
    pub fn is_sufficient(&self) -> bool {
        matches!(self, FundsCheck::Sufficient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_total_and_freshness() {
        let t0 = Utc::now();
        let balance = Balance::from_snapshot(
            BalanceSnapshot {
                available: dec!(80),
                locked: dec!(20),
            },
            t0,
            Duration::seconds(30),
        );
        assert_eq!(balance.total, dec!(100));
        assert!(balance.is_fresh(t0 + Duration::seconds(29)));
        assert!(!balance.is_fresh(t0 + Duration::seconds(30)));
        assert_eq!(balance.age(t0 + Duration::seconds(5)), Duration::seconds(5));
    }

    #[test]
    fn test_unknown_is_not_sufficient() {
        assert!(!FundsCheck::Unknown {
            reason: "timeout".into()
        }
        .is_sufficient());
        assert!(FundsCheck::Sufficient {
            required: dec!(1),
            available: dec!(2)
        }
        .is_sufficient());
    }
}
