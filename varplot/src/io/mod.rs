//! Table readers for flux/statistics inputs

pub mod columns;
#[cfg(feature = "fits")]
pub mod fits;
pub mod sqlite;
pub mod tables;

pub use columns::{read_table, Column, ColumnTable};
pub use sqlite::{DbEpochRow, SqliteStore};
pub use tables::{FluxTable, StatsTable, PVAL_COLUMNS};
