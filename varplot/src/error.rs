//! Error type shared by the table readers, renderers and the batch scheduler.

use std::path::PathBuf;

use thiserror::Error;

use crate::time_parse::TimeParseError;

/// Errors that can occur while loading tables or rendering plots
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// cfitsio errors are flattened to text so the error stays `Send` across workers
    #[error("FITS table error in {path}: {message}")]
    Fits { path: PathBuf, message: String },

    #[error("Table {table} has no column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error(
        "Flux table column families differ in length: {epochs} epoch, {fluxes} peak_flux, {errors} err_peak_flux"
    )]
    ColumnMismatch {
        epochs: usize,
        fluxes: usize,
        errors: usize,
    },

    #[error("Invalid value '{value}' in column '{column}' (row {row})")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("No statistics row for source {uuid}")]
    MissingStats { uuid: String },

    #[error("Source {uuid} appears more than once in the statistics table")]
    DuplicateSource { uuid: String },

    #[error("Source {uuid}: {source}")]
    TimeParse {
        uuid: String,
        #[source]
        source: TimeParseError,
    },

    #[error("Panicked while processing row: {message}")]
    RowPanicked { message: String },

        #[error("Worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    #[error("Failed to draw {path}: {message}")]
    Drawing { path: PathBuf, message: String },

    #[error("Invalid plot style in {path}: {message}")]
    Style { path: PathBuf, message: String },
}

impl PlotError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PlotError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlotError>;
