//! Order execution
//!
//! - `retry`: deadline, retry/backoff policy and call pacing for remote calls
//! - `executor`: order lifecycle, reconciliation and fill confirmation
//! - `inflight`: one in-flight order per (asset, side)
//! - `slippage`: post-fill price deviation checks

pub mod executor;
pub mod inflight;
pub mod retry;
pub mod slippage;

pub use executor::OrderExecutor;
pub use inflight::{InFlightGuard, InFlightRegistry};
pub use retry::{CallPacer, RetryPolicy};
pub use slippage::SlippageMonitor;
