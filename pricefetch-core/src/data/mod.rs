//! Price providers.

pub mod provider;
pub mod yahoo;

pub use provider::{FetchError, PriceProvider};
pub use yahoo::YahooProvider;
