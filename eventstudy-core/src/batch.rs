//! Multi-ticker batch driver.
//!
//! Tickers are independent: each one reads its own artifacts and writes its
//! own outputs, so they run in parallel on the rayon pool without locking.
//! A failing ticker is recorded and never stops the others.

use crate::config::StudyConfig;
use crate::data::provider::{MarketDataProvider, ProviderError};
use crate::data::retrieve::Retriever;
use crate::error::PipelineError;
use crate::events::EventExtractor;
use crate::export::{self, EventsSummary, ExportError, ReturnsSummary, RunSummary};
use crate::returns::ReturnBuilder;
use rayon::prelude::*;
use thiserror::Error;

/// Which pipeline stages to run per ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stages {
    pub retrieve: bool,
    pub returns: bool,
    pub events: bool,
}

impl Default for Stages {
    fn default() -> Self {
        Self {
            retrieve: false,
            returns: true,
            events: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum TickerError {
    #[error("retrieval failed: {0}")]
    Retrieve(#[from] ProviderError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    #[error("retrieval requested but no provider configured")]
    NoProvider,
}

/// Summary of a batch run, sorted by ticker.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: Vec<RunSummary>,
    pub errors: Vec<(String, TickerError)>,
}

impl BatchSummary {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run the selected stages for one ticker and write its outputs.
///
/// Every selected table is built before anything is written, so a failing
/// ticker leaves no partial output. When retrieval was allowed to skip
/// recommendations the events stage is skipped as well.
pub fn run_ticker(
    config: &StudyConfig,
    provider: Option<&dyn MarketDataProvider>,
    ticker: &str,
    stages: Stages,
    allow_missing_recommendations: bool,
) -> Result<RunSummary, TickerError> {
    let mut build_events = stages.events;
    if stages.retrieve {
        let provider = provider.ok_or(TickerError::NoProvider)?;
        let report = Retriever::new(provider, config, config.start, config.end)
            .allow_missing_recommendations(allow_missing_recommendations)
            .retrieve(ticker)?;
        if build_events && report.recommendation_count.is_none() {
            tracing::warn!(ticker, "no recommendations retrieved, skipping events");
            build_events = false;
        }
    }

    let returns_table = stages
        .returns
        .then(|| ReturnBuilder::new(config).build_returns(ticker))
        .transpose()?;
    let events_table = build_events
        .then(|| EventExtractor::new(config).build_events(ticker))
        .transpose()?;

    let returns = match &returns_table {
        Some(table) => {
            let digest = export::write_returns(&config.returns_output(ticker), table)?;
            Some(ReturnsSummary::new(table, digest))
        }
        None => None,
    };
    let events = match &events_table {
        Some(table) => {
            let digest = export::write_events(&config.events_output(ticker), table)?;
            Some(EventsSummary::new(table, digest))
        }
        None => {
            if stages.events {
                export::remove_output(&config.events_output(ticker))?;
            }
            None
        }
    };

    let summary = RunSummary {
        ticker: ticker.to_string(),
        returns,
        events,
    };
    export::write_summary(&config.summary_output(ticker), &summary)?;
    Ok(summary)
}

/// Process every ticker in parallel.
pub fn run_batch(
    config: &StudyConfig,
    provider: Option<&dyn MarketDataProvider>,
    tickers: &[String],
    stages: Stages,
    allow_missing_recommendations: bool,
) -> BatchSummary {
    let mut results: Vec<(String, Result<RunSummary, TickerError>)> = tickers
        .par_iter()
        .map(|ticker| {
            let result =
                run_ticker(config, provider, ticker, stages, allow_missing_recommendations);
            if let Err(e) = &result {
                tracing::error!(ticker = %ticker, error = %e, "ticker failed");
            }
            (ticker.clone(), result)
        })
        .collect();
    results.sort_by(|a, b| a.0.cmp(&b.0));

    let mut summary = BatchSummary {
        total: results.len(),
        ..Default::default()
    };
    for (ticker, result) in results {
        match result {
            Ok(run) => summary.succeeded.push(run),
            Err(e) => summary.errors.push((ticker, e)),
        }
    }

    tracing::info!(
        total = summary.total,
        succeeded = summary.succeeded.len(),
        failed = summary.failed(),
        "batch complete"
    );
    summary
}
