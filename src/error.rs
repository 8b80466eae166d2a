use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::DenyReason;

/// Main error type for the execution and risk core
#[derive(Error, Debug)]
pub enum GuardError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Validation errors (terminal, never retried)
    #[error("Validation failed: {0}")]
    Validation(String),

    // Network errors
    #[error("{operation} timed out after {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    // Order execution errors
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    TimedOutTerminal { attempts: u32, last_error: String },

    #[error("Order already in flight for {key}")]
    DuplicateInFlight { key: String },

    // Funds errors
    #[error("Insufficient funds: required ${required}, available ${available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("Balance unavailable: {0}")]
    BalanceUnavailable(String),

    // Risk errors
    #[error("Kill switch is active")]
    KillSwitchActive,

    #[error("Risk denied: {0}")]
    RiskDenied(DenyReason),

    // State errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl GuardError {
    /// Whether a remote call that failed with this error may be attempted again.
    ///
    /// Only deadline expiry and transport-level faults qualify. Everything the
    /// exchange deliberately refused, and every local decision, is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GuardError::Timeout { .. }
                | GuardError::TransientNetwork(_)
                | GuardError::RateLimited(_)
        )
    }

    /// Machine-readable code for logs and operator tooling
    pub fn code(&self) -> &'static str {
        match self {
            GuardError::Config(_) => "config",
            GuardError::Json(_) => "json",
            GuardError::Io(_) => "io",
            GuardError::Validation(_) => "validation",
            GuardError::Timeout { .. } => "timeout",
            GuardError::TransientNetwork(_) => "transient_network",
            GuardError::RateLimited(_) => "rate_limited",
            GuardError::OrderRejected(_) => "order_rejected",
            GuardError::OrderNotFound(_) => "order_not_found",
            GuardError::TimedOutTerminal { .. } => "timed_out_terminal",
            GuardError::DuplicateInFlight { .. } => "duplicate_in_flight",
            GuardError::InsufficientFunds { .. } => "insufficient_funds",
            GuardError::BalanceUnavailable(_) => "balance_unavailable",
            GuardError::KillSwitchActive => "kill_switch",
            GuardError::RiskDenied(reason) => reason.as_str(),
            GuardError::InvalidStateTransition { .. } => "invalid_state_transition",
            GuardError::Persistence(_) => "persistence",
            GuardError::Internal(_) => "internal",
            GuardError::Other(_) => "other",
        }
    }
}

/// Result type alias for GuardError
pub type Result<T> = std::result::Result<T, GuardError>;
