pub mod paper;
mod traits;

pub use paper::PaperExchange;
pub use traits::ExchangeClient;

#[cfg(test)]
pub use traits::MockExchangeClient;
