//! Fixture storage errors.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while merging one exchange into the fixture store.
///
/// Every variant drops the exchange being recorded and nothing else.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to create fixture directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path} as an imposter array: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialize imposters for {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
