//! Study configuration and artifact path resolution.
//!
//! A study is described by a TOML file:
//!
//! ```toml
//! data_dir = "data"
//! output_dir = "output"
//! start = "2012-01-01"
//! end = "2020-12-31"
//! factors_csv = "ff_daily.csv"
//! tickers = ["TSLA", "AAPL"]
//! ```
//!
//! Relative `factors_csv` paths are resolved against `data_dir`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid sample period: start {start} is after end {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },
}

/// Locations of the raw per-ticker input tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Price table written by the retriever.
    pub prc_csv: PathBuf,
    /// Recommendation table written by the retriever.
    pub rec_csv: PathBuf,
}

/// Resolves where a ticker's artifacts live.
///
/// The builders only see this trait, so tests can point them at any layout.
pub trait PathResolver: Send + Sync {
    fn artifacts(&self, ticker: &str) -> ArtifactPaths;

    /// The benchmark factor table shared by every ticker.
    fn factors_csv(&self) -> PathBuf;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub factors_csv: PathBuf,
    #[serde(default)]
    pub tickers: Vec<String>,
}

impl StudyConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start > self.end {
            return Err(ConfigError::InvalidPeriod {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Default single-ticker study over 2012-2020.
    pub fn default_study() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            start: NaiveDate::from_ymd_opt(2012, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap_or_default(),
            factors_csv: PathBuf::from("ff_daily.csv"),
            tickers: vec!["TSLA".to_string()],
        }
    }

    /// Returns table output path: `{output_dir}/{ticker}_ret.csv`
    pub fn returns_output(&self, ticker: &str) -> PathBuf {
        self.output_dir.join(format!("{}_ret.csv", ticker.trim()))
    }

    /// Events table output path: `{output_dir}/{ticker}_events.csv`
    pub fn events_output(&self, ticker: &str) -> PathBuf {
        self.output_dir.join(format!("{}_events.csv", ticker.trim()))
    }

    /// Run summary path: `{output_dir}/{ticker}_summary.json`
    pub fn summary_output(&self, ticker: &str) -> PathBuf {
        self.output_dir.join(format!("{}_summary.json", ticker.trim()))
    }
}

impl PathResolver for StudyConfig {
    fn artifacts(&self, ticker: &str) -> ArtifactPaths {
        let ticker = ticker.trim();
        ArtifactPaths {
            prc_csv: self.data_dir.join(format!("{ticker}_prc.csv")),
            rec_csv: self.data_dir.join(format!("{ticker}_rec.csv")),
        }
    }

    fn factors_csv(&self) -> PathBuf {
        if self.factors_csv.is_absolute() {
            self.factors_csv.clone()
        } else {
            self.data_dir.join(&self.factors_csv)
        }
    }
}
