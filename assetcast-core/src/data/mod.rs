//! Market data gateway: provider trait, Yahoo provider, bounded retry.

pub mod gateway;
pub mod provider;
pub mod yahoo;

pub use gateway::{MarketDataGateway, RetryPolicy, Sleeper};
pub use provider::{DataError, MarketDataProvider};
pub use yahoo::YahooProvider;
