//! Data ingestion, retrieval and provider plumbing

pub mod ingest;
pub mod provider;
pub mod retrieve;
pub mod schema;
pub mod yahoo;

pub use ingest::{
    factors_from_frame, parse_timestamp, prices_from_frame, read_table, recommendations_from_frame,
};
pub use provider::{MarketDataProvider, ProviderError, RawBar, RawRecommendation};
pub use retrieve::{RetrieveReport, Retriever};
pub use schema::{standardise_column_name, TableSchema};
pub use yahoo::YahooProvider;
