//! Daily price, factor and return rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day of a ticker's price table.
///
/// Only `close` is required by the return computation; the remaining OHLCV
/// fields are carried when the source table has them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl PriceRecord {
    /// A record carrying only a close price.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close: Some(close),
            volume: None,
        }
    }
}

/// Benchmark market return for one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorRecord {
    pub date: NaiveDate,
    pub mkt: Option<f64>,
}

/// Joined stock and market return for one date. Both fields are always present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub date: NaiveDate,
    pub ret: f64,
    pub mkt: f64,
}
