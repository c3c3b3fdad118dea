//! Ошибки конвейера

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("required table `{table}` not found at {}", path.display())]
    MissingTable { table: &'static str, path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown {kind} reference `{value}`")]
    UnknownReference { kind: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
