//! EventExtractor: analyst recommendations to a deduplicated table of
//! upgrade/downgrade events.
//!
//! Pipeline per ticker:
//! 1. uppercase firm names, derive `event_date` from the timestamp
//! 2. stable sort by full timestamp
//! 3. keep the last record per `(event_date, firm)`
//! 4. drop actions containing neither "up" nor "down"
//! 5. classify into [`EventType`] and number rows from 1

use crate::config::PathResolver;
use crate::data::ingest::{read_table, recommendations_from_frame};
use crate::data::schema::TableSchema;
use crate::domain::{EventRecord, EventType, RecommendationRecord};
use crate::error::PipelineError;
use polars::prelude::DataFrame;
use std::collections::BTreeMap;

/// The surviving record of one `(event_date, firm)` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmDayAction {
    pub event_date: String,
    pub firm: String,
    pub action: String,
}

/// Events table keyed by a dense 1-based `event_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTable {
    rows: Vec<EventRecord>,
}

impl EventTable {
    pub fn rows(&self) -> &[EventRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn count(&self, event_type: EventType) -> usize {
        self.rows.iter().filter(|r| r.event_type == event_type).count()
    }
}

/// Collapse same-day recommendations from the same firm to the latest one.
///
/// Firms are compared case-insensitively (uppercased). Records are stably
/// sorted by their full timestamp before folding, so among equal timestamps
/// the one later in input order wins. Output is in `(event_date, firm)` order.
pub fn latest_per_firm_day(records: &[RecommendationRecord]) -> Vec<FirmDayAction> {
    let mut sorted: Vec<&RecommendationRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);

    let mut latest: BTreeMap<(String, String), &str> = BTreeMap::new();
    for rec in sorted {
        latest.insert((rec.event_date(), rec.firm.to_uppercase()), rec.action.as_str());
    }

    latest
        .into_iter()
        .map(|((event_date, firm), action)| FirmDayAction {
            event_date,
            firm,
            action: action.to_string(),
        })
        .collect()
}

/// Classify an action that already passed the rating-change filter.
pub fn classify(action: &str) -> Result<EventType, PipelineError> {
    EventType::from_action(action).ok_or_else(|| PipelineError::UnknownActionLabel {
        action: action.to_string(),
    })
}

/// Filter, classify and number deduplicated rows.
pub fn to_events(rows: Vec<FirmDayAction>) -> Result<EventTable, PipelineError> {
    let mut events = Vec::new();
    for row in rows {
        if !EventType::is_rating_change(&row.action) {
            continue;
        }
        let event_type = classify(&row.action)?;
        events.push(EventRecord {
            event_id: events.len() + 1,
            event_date: row.event_date,
            firm: row.firm,
            event_type,
        });
    }
    Ok(EventTable { rows: events })
}

/// Builds a ticker's events table from its recommendation artifact.
pub struct EventExtractor<'a> {
    resolver: &'a dyn PathResolver,
}

impl<'a> EventExtractor<'a> {
    pub fn new(resolver: &'a dyn PathResolver) -> Self {
        Self { resolver }
    }

    pub fn build_events(&self, ticker: &str) -> Result<EventTable, PipelineError> {
        let rec_csv = self.resolver.artifacts(ticker).rec_csv;
        let recs = read_table(&rec_csv, &TableSchema::RECOMMENDATIONS)?;

        let table = Self::from_frame(&recs)?;
        tracing::info!(
            ticker,
            recommendations = recs.height(),
            events = table.len(),
            upgrades = table.count(EventType::Upgrade),
            downgrades = table.count(EventType::Downgrade),
            "events table built"
        );
        Ok(table)
    }

    /// Same as `build_events` but over an already-normalized frame.
    pub fn from_frame(recs: &DataFrame) -> Result<EventTable, PipelineError> {
        let records = recommendations_from_frame(recs)?;
        Self::from_records(&records)
    }

    pub fn from_records(records: &[RecommendationRecord]) -> Result<EventTable, PipelineError> {
        let deduped = latest_per_firm_day(records);
        tracing::debug!(
            records = records.len(),
            groups = deduped.len(),
            "collapsed recommendations per firm and day"
        );
        to_events(deduped)
    }
}
