//! Retriever: fetch a ticker's raw tables and persist them as CSV artifacts.
//!
//! The files use the provider's raw layout (`Date,Open,...,Adj Close,Volume`
//! and `Date,Firm,To Grade,From Grade,Action`); column names are normalized
//! only when the builders read them back.

use super::provider::{MarketDataProvider, ProviderError, RawBar, RawRecommendation};
use crate::config::PathResolver;
use crate::export::write_atomic;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

const PRICE_HEADER: [&str; 7] = ["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"];
const REC_HEADER: [&str; 5] = ["Date", "Firm", "To Grade", "From Grade", "Action"];

/// Outcome of retrieving one ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieveReport {
    pub ticker: String,
    pub bar_count: usize,
    pub prc_csv: PathBuf,
    /// `None` when recommendations were unavailable and that was allowed.
    pub recommendation_count: Option<usize>,
    pub rec_csv: PathBuf,
}

pub struct Retriever<'a> {
    provider: &'a dyn MarketDataProvider,
    resolver: &'a dyn PathResolver,
    start: NaiveDate,
    end: NaiveDate,
    allow_missing_recommendations: bool,
}

impl<'a> Retriever<'a> {
    pub fn new(
        provider: &'a dyn MarketDataProvider,
        resolver: &'a dyn PathResolver,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            provider,
            resolver,
            start,
            end,
            allow_missing_recommendations: false,
        }
    }

    /// Keep the price artifact even if the recommendation fetch fails.
    pub fn allow_missing_recommendations(mut self, allow: bool) -> Self {
        self.allow_missing_recommendations = allow;
        self
    }

    /// Fetch both raw tables for `ticker` and write them to its artifact paths.
    pub fn retrieve(&self, ticker: &str) -> Result<RetrieveReport, ProviderError> {
        let locs = self.resolver.artifacts(ticker);
        tracing::info!(
            ticker,
            provider = self.provider.name(),
            start = %self.start,
            end = %self.end,
            "downloading prices"
        );

        let bars = self.provider.fetch_prices(ticker, self.start, self.end)?;
        write_atomic(&locs.prc_csv, &prices_csv(&bars)?)
            .map_err(|e| write_error(&locs.prc_csv, e))?;
        tracing::info!(ticker, bars = bars.len(), path = %locs.prc_csv.display(), "prices saved");

        let recommendation_count =
            match self.provider.fetch_recommendations(ticker, self.start, self.end) {
                Ok(recs) => {
                    write_atomic(&locs.rec_csv, &recommendations_csv(&recs)?)
                        .map_err(|e| write_error(&locs.rec_csv, e))?;
                    tracing::info!(
                        ticker,
                        recommendations = recs.len(),
                        path = %locs.rec_csv.display(),
                        "recommendations saved"
                    );
                    Some(recs.len())
                }
                Err(e) if self.allow_missing_recommendations => {
                    tracing::warn!(ticker, error = %e, "recommendations unavailable, skipping");
                    remove_stale(&locs.rec_csv)?;
                    None
                }
                Err(e) => return Err(e),
            };

        Ok(RetrieveReport {
            ticker: ticker.to_string(),
            bar_count: bars.len(),
            prc_csv: locs.prc_csv,
            recommendation_count,
            rec_csv: locs.rec_csv,
        })
    }
}

fn write_error(path: &Path, e: std::io::Error) -> ProviderError {
    ProviderError::Write(format!("{}: {e}", path.display()))
}

/// An older recommendation file would be read back as if it were current.
fn remove_stale(path: &Path) -> Result<(), ProviderError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "removed stale recommendation file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(write_error(path, e)),
    }
}

fn csv_error(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::Write(format!("csv encoding: {e}"))
}

/// Empty string for a missing (NaN) price.
fn price_cell(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

/// Encode raw bars in the provider's price layout.
pub fn prices_csv(bars: &[RawBar]) -> Result<Vec<u8>, ProviderError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(PRICE_HEADER).map_err(csv_error)?;
    for bar in bars {
        wtr.write_record([
            bar.date.format("%Y-%m-%d").to_string(),
            price_cell(bar.open),
            price_cell(bar.high),
            price_cell(bar.low),
            price_cell(bar.close),
            price_cell(bar.adj_close),
            bar.volume.to_string(),
        ])
        .map_err(csv_error)?;
    }
    wtr.into_inner().map_err(csv_error)
}

/// Encode raw recommendations in the provider's recommendation layout.
pub fn recommendations_csv(recs: &[RawRecommendation]) -> Result<Vec<u8>, ProviderError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(REC_HEADER).map_err(csv_error)?;
    for rec in recs {
        wtr.write_record([
            rec.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            rec.firm.clone(),
            rec.to_grade.clone(),
            rec.from_grade.clone(),
            rec.action.clone(),
        ])
        .map_err(csv_error)?;
    }
    wtr.into_inner().map_err(csv_error)
}
