use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::SampleIndex;

/// Error type for block bookkeeping, configuration, and dataset glue failures.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("unexpected filename, '{}'", path.display())]
    UnexpectedFile { path: PathBuf },
    #[error("no block covers index {index} (expected a block starting at {block_start})")]
    BlockNotFound {
        index: SampleIndex,
        block_start: SampleIndex,
    },
    #[error("block file '{}' does not follow the 'start-end.ext' naming scheme", path.display())]
    InvalidBlockName { path: PathBuf },
    #[error("directory not found, '{}'", .0.display())]
    NotADirectory(PathBuf),
    #[error("block file '{}' could not be decoded: {reason}", path.display())]
    Format { path: PathBuf, reason: String },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("dataset error: {0}")]
    Dataset(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
