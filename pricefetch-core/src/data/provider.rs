//! Price provider trait and structured fetch errors.
//!
//! The PriceProvider trait abstracts over quote sources so the pipeline can
//! run against Yahoo Finance in production and a stub in tests.

use crate::config::FetchWindow;
use crate::domain::PricePoint;
use thiserror::Error;

/// Per-symbol fetch failures.
///
/// None of these abort a run: the pipeline logs them as warnings and moves
/// on to the next commodity.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} for {symbol}")]
    Http { symbol: String, status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("fetch error: {0}")]
    Other(String),
}

/// Trait for quote providers.
pub trait PriceProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily closes for `symbol`, ordered by date.
    ///
    /// An empty vector means the provider knows the symbol but has no
    /// prices in the window (weekends, holidays).
    fn fetch(&self, symbol: &str, window: &FetchWindow) -> Result<Vec<PricePoint>, FetchError>;
}
