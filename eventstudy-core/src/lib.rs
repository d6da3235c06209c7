//! Event Study Core — returns and analyst-event tables for event studies.
//!
//! This crate contains the data pipeline:
//! - Domain types (price, factor, return, recommendation and event rows)
//! - CSV ingest with column-name normalization
//! - ReturnBuilder: daily simple returns inner-joined with a market benchmark
//! - EventExtractor: last-action-per-firm-day dedup and up/down classification
//! - Retriever over a pluggable market data provider (Yahoo Finance)
//! - Deterministic CSV export and a parallel multi-ticker batch driver

pub mod batch;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod events;
pub mod export;
pub mod returns;

pub use batch::{run_batch, run_ticker, BatchSummary, Stages, TickerError};
pub use config::{ArtifactPaths, ConfigError, PathResolver, StudyConfig};
pub use error::{Artifact, PipelineError};
pub use events::{EventExtractor, EventTable};
pub use returns::{ReturnBuilder, ReturnTable};
