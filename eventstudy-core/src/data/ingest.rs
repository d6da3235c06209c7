//! CSV ingest: raw artifact files to typed records.
//!
//! Files are read with every column as text so that an unparsable cell
//! surfaces as `MalformedInput` instead of quietly becoming null.

use super::schema::TableSchema;
use crate::domain::{FactorRecord, PriceRecord, RecommendationRecord};
use crate::error::{Artifact, PipelineError};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::path::Path;

/// Read a headered CSV artifact and normalize its column names.
pub fn read_table(path: &Path, schema: &TableSchema) -> Result<DataFrame, PipelineError> {
    if let Err(e) = std::fs::File::open(path) {
        return Err(PipelineError::MissingArtifact {
            artifact: schema.artifact,
            path: path.to_path_buf(),
            reason: e.to_string(),
        });
    }

    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
        .and_then(|lf| lf.collect())
        .map_err(|e| {
            PipelineError::malformed(schema.artifact, format!("{}: {e}", path.display()))
        })?;

    schema.normalize(df)
}

/// Parse a date or timestamp cell.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.f]`, the `T`-separated form,
/// and either timestamp form with a trailing UTC offset. An offset is dropped
/// and the local wall time kept.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"] {
        if let Ok(ts) = DateTime::parse_from_str(raw, fmt) {
            return Some(ts.naive_local());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// All cells of a column as optional strings. Empty cells are `None`.
fn text_column(
    df: &DataFrame,
    name: &str,
    artifact: Artifact,
) -> Result<Vec<Option<String>>, PipelineError> {
    let column = df
        .column(name)
        .and_then(|c| c.cast(&DataType::String))
        .map_err(|e| PipelineError::malformed(artifact, e.to_string()))?;
    let values = column
        .str()
        .map_err(|e| PipelineError::malformed(artifact, e.to_string()))?;

    Ok(values
        .into_iter()
        .map(|v| v.filter(|s| !s.trim().is_empty()).map(str::to_string))
        .collect())
}

/// Optional numeric column: `None` per row when the column is absent.
fn float_column(
    df: &DataFrame,
    name: &str,
    artifact: Artifact,
) -> Result<Vec<Option<f64>>, PipelineError> {
    if df.column(name).is_err() {
        return Ok(vec![None; df.height()]);
    }
    text_column(df, name, artifact)?
        .into_iter()
        .enumerate()
        .map(|(row, cell)| match cell {
            None => Ok(None),
            Some(s) => s
                .trim()
                .parse::<f64>()
                .map(|v| if v.is_nan() { None } else { Some(v) })
                .map_err(|_| {
                    PipelineError::malformed(
                        artifact,
                        format!("row {row}: `{name}` value {s:?} is not a number"),
                    )
                }),
        })
        .collect()
}

fn timestamp_column(
    df: &DataFrame,
    name: &str,
    artifact: Artifact,
) -> Result<Vec<NaiveDateTime>, PipelineError> {
    text_column(df, name, artifact)?
        .into_iter()
        .enumerate()
        .map(|(row, cell)| {
            let s = cell.ok_or_else(|| {
                PipelineError::malformed(artifact, format!("row {row}: empty `{name}`"))
            })?;
            parse_timestamp(&s).ok_or_else(|| {
                PipelineError::malformed(artifact, format!("row {row}: unparsable `{name}` {s:?}"))
            })
        })
        .collect()
}

/// Typed price rows from a normalized price frame, in file order.
pub fn prices_from_frame(df: &DataFrame) -> Result<Vec<PriceRecord>, PipelineError> {
    let schema = TableSchema::PRICES;
    schema.validate(df)?;
    let artifact = schema.artifact;

    let dates = timestamp_column(df, schema.key, artifact)?;
    let open = float_column(df, "open", artifact)?;
    let high = float_column(df, "high", artifact)?;
    let low = float_column(df, "low", artifact)?;
    let close = float_column(df, "close", artifact)?;
    let volume = float_column(df, "volume", artifact)?;

    Ok(dates
        .into_iter()
        .enumerate()
        .map(|(i, ts)| PriceRecord {
            date: ts.date(),
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            volume: volume[i],
        })
        .collect())
}

/// Typed factor rows from a normalized factor frame, in file order.
pub fn factors_from_frame(df: &DataFrame) -> Result<Vec<FactorRecord>, PipelineError> {
    let schema = TableSchema::FACTORS;
    schema.validate(df)?;

    let dates = timestamp_column(df, schema.key, schema.artifact)?;
    let mkt = float_column(df, "mkt", schema.artifact)?;

    Ok(dates
        .into_iter()
        .zip(mkt)
        .map(|(ts, mkt)| FactorRecord {
            date: ts.date(),
            mkt,
        })
        .collect())
}

/// Typed recommendation rows, in file order.
///
/// Rows with an empty firm cannot be grouped and are dropped. An empty action
/// is kept as `""`; it never qualifies as a rating change.
pub fn recommendations_from_frame(
    df: &DataFrame,
) -> Result<Vec<RecommendationRecord>, PipelineError> {
    let schema = TableSchema::RECOMMENDATIONS;
    schema.validate(df)?;
    let artifact = schema.artifact;

    let timestamps = timestamp_column(df, schema.key, artifact)?;
    let firms = text_column(df, "firm", artifact)?;
    let actions = text_column(df, "action", artifact)?;

    let mut records = Vec::with_capacity(timestamps.len());
    let rows = timestamps.into_iter().zip(firms).zip(actions).enumerate();
    for (row, ((timestamp, firm), action)) in rows {
        let Some(firm) = firm else {
            tracing::debug!(row, "dropping recommendation without firm");
            continue;
        };
        records.push(RecommendationRecord {
            timestamp,
            firm,
            action: action.unwrap_or_default(),
        });
    }
    Ok(records)
}
