pub mod checker;

pub use checker::BalanceChecker;
