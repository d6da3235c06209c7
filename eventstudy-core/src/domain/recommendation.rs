//! Analyst recommendation rows.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single analyst action as recorded by the data provider.
///
/// Timestamps are not unique: several firms (or one firm several times) can
/// act on the same day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub timestamp: NaiveDateTime,
    pub firm: String,
    pub action: String,
}

impl RecommendationRecord {
    pub fn new(
        timestamp: NaiveDateTime,
        firm: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            firm: firm.into(),
            action: action.into(),
        }
    }

    /// Calendar date of the action as `YYYY-MM-DD`, time of day discarded.
    pub fn event_date(&self) -> String {
        self.timestamp.date().format("%Y-%m-%d").to_string()
    }
}
