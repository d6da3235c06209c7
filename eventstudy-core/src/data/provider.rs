//! Market data provider trait and structured error types.
//!
//! The MarketDataProvider trait abstracts over the source of raw price bars and
//! analyst recommendations, so the retriever can be driven by Yahoo Finance in
//! production and by an in-memory mock in tests.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw daily OHLCV bar as delivered by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

/// Raw analyst recommendation as delivered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecommendation {
    pub timestamp: NaiveDateTime,
    pub firm: String,
    pub to_grade: String,
    pub from_grade: String,
    /// Free-form action label, e.g. "up", "down", "main", "init".
    pub action: String,
}

/// Structured error types for provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("failed to write artifact: {0}")]
    Write(String),

    #[error("provider error: {0}")]
    Other(String),
}

/// Source of raw market data for one ticker at a time.
///
/// Implementations own their network timeout and retry policy. Nothing above
/// this trait retries.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Daily bars for `[start, end]`, dates ascending.
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, ProviderError>;

    /// Analyst recommendations dated within `[start, end]`.
    fn fetch_recommendations(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRecommendation>, ProviderError>;
}

/// Keep only recommendations whose calendar date lies within `[start, end]`.
pub fn within_period(
    recs: Vec<RawRecommendation>,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<RawRecommendation> {
    recs.into_iter()
        .filter(|r| {
            let d = r.timestamp.date();
            d >= start && d <= end
        })
        .collect()
}
