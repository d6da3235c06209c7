use crate::error::{Artifact, PipelineError};
use polars::prelude::*;
use std::collections::HashSet;

/// Normalize a raw column header to the canonical lowercase schema.
///
/// `"Close"` -> `"close"`, `"Adj Close"` -> `"adj_close"`, `"To Grade"` -> `"to_grade"`.
/// Runs of whitespace, `-`, `.` and `_` collapse to a single `_`; leading and
/// trailing separators are dropped.
pub fn standardise_column_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() || matches!(ch, '-' | '.' | '_') {
            pending_sep = !out.is_empty();
        } else {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// Expected columns of one input table, after normalization.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub artifact: Artifact,
    /// Name of the key column (date or timestamp).
    pub key: &'static str,
    pub required: &'static [&'static str],
}

impl TableSchema {
    pub const PRICES: Self = Self {
        artifact: Artifact::Prices,
        key: "date",
        required: &["date", "close"],
    };

    pub const RECOMMENDATIONS: Self = Self {
        artifact: Artifact::Recommendations,
        key: "date",
        required: &["date", "firm", "action"],
    };

    pub const FACTORS: Self = Self {
        artifact: Artifact::Factors,
        key: "date",
        required: &["date", "mkt"],
    };

    /// Rename every column to its canonical name, then validate.
    pub fn normalize(&self, mut df: DataFrame) -> Result<DataFrame, PipelineError> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| standardise_column_name(name.as_str()))
            .collect();

        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::malformed(
                    self.artifact,
                    format!("two columns normalize to `{name}`"),
                ));
            }
        }

        df.set_column_names(names)
            .map_err(|e| PipelineError::malformed(self.artifact, e.to_string()))?;
        self.validate(&df)?;
        Ok(df)
    }

    /// Check every required column exists.
    pub fn validate(&self, df: &DataFrame) -> Result<(), PipelineError> {
        let actual = df.get_column_names();
        for column in self.required {
            if !actual.iter().any(|name| name.as_str() == *column) {
                return Err(PipelineError::malformed(
                    self.artifact,
                    format!("missing required column `{column}`"),
                ));
            }
        }
        Ok(())
    }
}
