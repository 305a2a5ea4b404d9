//! Error types shared by the whole crate.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Inconsistent setup detected before any sampling starts.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wave vector {index} cannot be used here: {reason}")]
    ForbiddenWaveVector { index: usize, reason: String },

    /// Removing every mode did not bring the system back to its lattice energy.
    #[error("Normal-mode decomposition violated: residual energy {residual} after removing all modes")]
    DecompositionViolated { residual: f64 },

    #[error("Invalid Bennett parameter {value} during {phase}; reference and target ensembles do not overlap")]
    BennettParameter { value: f64, phase: &'static str },

    #[error("Failed to parse '{path}': {message}", path = path.display())]
    Parse { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub(crate) fn forbidden(index: usize, reason: impl Into<String>) -> Self {
        Error::ForbiddenWaveVector {
            index,
            reason: reason.into(),
        }
    }
}
