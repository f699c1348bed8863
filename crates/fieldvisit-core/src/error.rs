// crates/fieldvisit-core/src/error.rs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: fieldvisit_parser::ParserError,
    },

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("output error: {0}")]
    Output(#[from] crate::outputs::OutputError),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
