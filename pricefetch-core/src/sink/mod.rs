//! Output sinks for fetched prices.

pub mod csv;

pub use self::csv::CsvSink;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{} already exists and overwriting is disabled", path.display())]
    FileConflict { path: PathBuf },

    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
}
