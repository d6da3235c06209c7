//! Pipeline error taxonomy.
//!
//! Every failure is fatal for the ticker being processed and propagates to the
//! direct caller. Nothing here is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Which input table an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Prices,
    Recommendations,
    Factors,
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Prices => "price table",
            Self::Recommendations => "recommendation table",
            Self::Factors => "factor table",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing {artifact}: {path} ({reason})")]
    MissingArtifact {
        artifact: Artifact,
        path: PathBuf,
        reason: String,
    },

    #[error("malformed {artifact}: {reason}")]
    MalformedInput { artifact: Artifact, reason: String },

    #[error("unknown value for column `action`: {action:?}")]
    UnknownActionLabel { action: String },
}

impl PipelineError {
    pub(crate) fn malformed(artifact: Artifact, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            artifact,
            reason: reason.into(),
        }
    }
}
