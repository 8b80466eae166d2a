use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the circuit breaker tripped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripReason {
    DailyLossLimit,
    ConsecutiveLosses,
    MinBankroll,
    Manual,
}

impl TripReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripReason::DailyLossLimit => "daily_loss_limit",
            TripReason::ConsecutiveLosses => "consecutive_losses",
            TripReason::MinBankroll => "min_bankroll",
            TripReason::Manual => "manual_halt",
        }
    }

    /// Cleared automatically at the calendar-day boundary
    pub fn clears_daily(&self) -> bool {
        matches!(
            self,
            TripReason::DailyLossLimit | TripReason::ConsecutiveLosses
        )
    }
}

impl fmt::Display for TripReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Machine-readable reason attached to every authorization denial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    KillSwitch,
    StateUnpersisted,
    DailyLossLimit,
    ConsecutiveLosses,
    MinBankroll,
    ManualHalt,
    Cooldown,
    DailyTradeCap,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::KillSwitch => "kill_switch",
            DenyReason::StateUnpersisted => "state_unpersisted",
            DenyReason::DailyLossLimit => "daily_loss_limit",
            DenyReason::ConsecutiveLosses => "consecutive_losses",
            DenyReason::MinBankroll => "min_bankroll",
            DenyReason::ManualHalt => "manual_halt",
            DenyReason::Cooldown => "cooldown",
            DenyReason::DailyTradeCap => "daily_trade_cap",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<TripReason> for DenyReason {
    fn from(reason: TripReason) -> Self {
        match reason {
            TripReason::DailyLossLimit => DenyReason::DailyLossLimit,
            TripReason::ConsecutiveLosses => DenyReason::ConsecutiveLosses,
            TripReason::MinBankroll => DenyReason::MinBankroll,
            TripReason::Manual => DenyReason::ManualHalt,
        }
    }
}

/// Circuit breaker state derived from the risk state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BreakerState {
    Normal,
    Cooldown,
    Tripped,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerState::Normal => write!(f, "NORMAL"),
            BreakerState::Cooldown => write!(f, "COOLDOWN"),
            BreakerState::Tripped => write!(f, "TRIPPED"),
        }
    }
}

/// Account-level risk counters. Persisted after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    pub daily_pnl: Decimal,
    pub consecutive_losses: u32,
    pub trades_today: u32,
    pub day_start: NaiveDate,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub tripped: bool,
    pub trip_reason: Option<TripReason>,
    pub updated_at: DateTime<Utc>,
}

impl RiskState {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            daily_pnl: Decimal::ZERO,
            consecutive_losses: 0,
            trades_today: 0,
            day_start: now.date_naive(),
            cooldown_until: None,
            tripped: false,
            trip_reason: None,
            updated_at: now,
        }
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.map_or(false, |until| now < until)
    }

    pub fn is_tripped_for(&self, reason: TripReason) -> bool {
        self.tripped && self.trip_reason == Some(reason)
    }

    pub fn breaker_state(&self, now: DateTime<Utc>) -> BreakerState {
        if self.tripped {
            BreakerState::Tripped
        } else if self.in_cooldown(now) {
            BreakerState::Cooldown
        } else {
            BreakerState::Normal
        }
    }
}

/// Outcome of an authorization request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
}

impl Authorization {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: DenyReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }

    /// Reason code, or "ok" when allowed
    pub fn reason_code(&self) -> &'static str {
        self.reason.map_or("ok", |r| r.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_breaker_state_derivation() {
        let now = Utc::now();
        let mut state = RiskState::fresh(now);
        assert_eq!(state.breaker_state(now), BreakerState::Normal);

        state.cooldown_until = Some(now + Duration::minutes(15));
        assert_eq!(state.breaker_state(now), BreakerState::Cooldown);
        assert_eq!(
            state.breaker_state(now + Duration::minutes(15)),
            BreakerState::Normal
        );

        state.tripped = true;
        state.trip_reason = Some(TripReason::MinBankroll);
        assert_eq!(state.breaker_state(now), BreakerState::Tripped);
        assert!(state.is_tripped_for(TripReason::MinBankroll));
        assert!(!TripReason::MinBankroll.clears_daily());
    }

    #[test]
    fn test_reason_codes_serialize_as_snake_case() {
        let json = serde_json::to_string(&DenyReason::DailyTradeCap).unwrap();
        assert_eq!(json, "\"daily_trade_cap\"");
        assert_eq!(DenyReason::from(TripReason::Manual), DenyReason::ManualHalt);
        assert_eq!(Authorization::allow().reason_code(), "ok");
        assert_eq!(
            Authorization::deny(DenyReason::Cooldown).reason_code(),
            "cooldown"
        );
    }

    #[test]
    fn test_risk_state_roundtrips_through_json() {
        let mut state = RiskState::fresh(Utc::now());
        state.tripped = true;
        state.trip_reason = Some(TripReason::ConsecutiveLosses);
        let json = serde_json::to_string(&state).unwrap();
        let back: RiskState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
