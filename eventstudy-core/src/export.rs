//! CSV and JSON export of the derived tables.
//!
//! Encoding is deterministic: the same table always produces the same bytes,
//! and therefore the same BLAKE3 fingerprint.

use crate::domain::EventType;
use crate::events::EventTable;
use crate::returns::ReturnTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Write `bytes` to `path` via a `.tmp` sibling and a rename, creating the
/// parent directory if needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp_path);
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    write_atomic(path, bytes).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Delete an output left by an earlier run. A missing file is fine.
pub fn remove_output(path: &Path) -> Result<(), ExportError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ExportError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// `date,ret,mkt`
pub fn returns_csv(table: &ReturnTable) -> Result<Vec<u8>, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    if table.is_empty() {
        wtr.write_record(["date", "ret", "mkt"])?;
    }
    for row in table.rows() {
        wtr.serialize(row)?;
    }
    wtr.into_inner().map_err(|e| ExportError::Csv(e.into_error().into()))
}

/// `event_id,event_date,firm,event_type`
pub fn events_csv(table: &EventTable) -> Result<Vec<u8>, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    if table.is_empty() {
        wtr.write_record(["event_id", "event_date", "firm", "event_type"])?;
    }
    for row in table.rows() {
        wtr.serialize(row)?;
    }
    wtr.into_inner().map_err(|e| ExportError::Csv(e.into_error().into()))
}

/// BLAKE3 hex digest of an encoded table.
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

pub fn write_returns(path: &Path, table: &ReturnTable) -> Result<String, ExportError> {
    let bytes = returns_csv(table)?;
    write_file(path, &bytes)?;
    Ok(fingerprint(&bytes))
}

pub fn write_events(path: &Path, table: &EventTable) -> Result<String, ExportError> {
    let bytes = events_csv(table)?;
    write_file(path, &bytes)?;
    Ok(fingerprint(&bytes))
}

/// Per-ticker summary written next to the tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub ticker: String,
    pub returns: Option<ReturnsSummary>,
    pub events: Option<EventsSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnsSummary {
    pub rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsSummary {
    pub rows: usize,
    pub upgrades: usize,
    pub downgrades: usize,
    pub fingerprint: String,
}

impl ReturnsSummary {
    pub fn new(table: &ReturnTable, fingerprint: String) -> Self {
        Self {
            rows: table.len(),
            first_date: table.first_date(),
            last_date: table.last_date(),
            fingerprint,
        }
    }
}

impl EventsSummary {
    pub fn new(table: &EventTable, fingerprint: String) -> Self {
        Self {
            rows: table.len(),
            upgrades: table.count(EventType::Upgrade),
            downgrades: table.count(EventType::Downgrade),
            fingerprint,
        }
    }
}

pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(summary)?;
    write_file(path, json.as_bytes())
}
