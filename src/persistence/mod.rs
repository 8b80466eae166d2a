//! Durable state
//!
//! - Risk state snapshot, rewritten atomically after every mutation
//! - Order journal, one JSON line per order lifecycle transition

pub mod order_journal;
pub mod state_store;

pub use order_journal::{JsonlOrderJournal, MemoryOrderJournal, OrderJournal};
pub use state_store::{JsonFileStateStore, MemoryStateStore, RiskStateStore};
