//! Typed flux and statistics tables.

use std::collections::HashMap;
use std::path::Path;

use super::columns::{read_table, ColumnTable};
use crate::error::{PlotError, Result};
use crate::model::{FluxRow, StatsRecord};

pub const EPOCH_PREFIX: &str = "epoch";
pub const FLUX_PREFIX: &str = "peak_flux";
pub const ERR_FLUX_PREFIX: &str = "err_peak_flux";

/// P-value columns tried, in order, when none is given explicitly
pub const PVAL_COLUMNS: [&str; 2] = ["pval_peak_flux", "pval_peak_flux_ks"];

/// Per-source flux measurements, one row per source
#[derive(Debug, Clone, PartialEq)]
pub struct FluxTable {
    rows: Vec<FluxRow>,
    has_epochs: bool,
}

impl FluxTable {
    pub fn read(path: &Path) -> Result<Self> {
        Self::from_columns(&read_table(path)?)
    }

    /// Build from a column table, grouping `epoch*`, `peak_flux*` and
    /// `err_peak_flux*` columns into parallel families
    pub fn from_columns(table: &ColumnTable) -> Result<Self> {
        let uuid_col = table.require("uuid")?;
        let epoch_cols = table.family(EPOCH_PREFIX);
        let flux_cols = table.family(FLUX_PREFIX);
        let err_cols = table.family(ERR_FLUX_PREFIX);

        if flux_cols.len() != err_cols.len()
            || (!epoch_cols.is_empty() && epoch_cols.len() != flux_cols.len())
        {
            return Err(PlotError::ColumnMismatch {
                epochs: epoch_cols.len(),
                fluxes: flux_cols.len(),
                errors: err_cols.len(),
            });
        }

        let mut rows = Vec::with_capacity(table.num_rows());
        for row in 0..table.num_rows() {
            let epochs = epoch_cols.iter().map(|&c| table.text(c, row)).collect();
            let fluxes = flux_cols
                .iter()
                .map(|&c| table.float(c, row))
                .collect::<Result<Vec<_>>>()?;
            let errors = err_cols
                .iter()
                .map(|&c| table.float(c, row))
                .collect::<Result<Vec<_>>>()?;

            rows.push(FluxRow {
                uuid: table.text(uuid_col, row),
                epochs,
                fluxes,
                errors,
            });
        }

        Ok(Self {
            rows,
            has_epochs: !epoch_cols.is_empty(),
        })
    }

    pub fn from_rows(rows: Vec<FluxRow>) -> Self {
        let has_epochs = rows.iter().any(|r| !r.epochs.is_empty());
        Self { rows, has_epochs }
    }

    pub fn rows(&self) -> &[FluxRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether epoch columns carry timestamps (otherwise epochs are column indices)
    pub fn has_epochs(&self) -> bool {
        self.has_epochs
    }
}

/// Per-source statistics indexed by uuid
#[derive(Debug, Clone, PartialEq)]
pub struct StatsTable {
    records: Vec<StatsRecord>,
    index: HashMap<String, usize>,
    pval_column: String,
}

impl StatsTable {
    /// Read a statistics table; `pval_column` overrides p-value column detection
    pub fn read(path: &Path, pval_column: Option<&str>) -> Result<Self> {
        Self::from_columns(&read_table(path)?, pval_column)
    }

    pub fn from_columns(table: &ColumnTable, pval_column: Option<&str>) -> Result<Self> {
        let uuid_col = table.require("uuid")?;
        let m_col = table.require("m")?;
        let md_col = table.require("md")?;
        let chisq_col = table.require("chisq_peak_flux")?;
        let mean_col = table.require("mean_peak_flux")?;

        let pval_name = match pval_column {
            Some(name) => name.to_string(),
            None => PVAL_COLUMNS
                .iter()
                .find(|name| table.position(name).is_some())
                .map(|name| name.to_string())
                .ok_or_else(|| PlotError::MissingColumn {
                    table: table.name().to_string(),
                    column: PVAL_COLUMNS.join(" or "),
                })?,
        };
        let pval_col = table.require(&pval_name)?;

        let mut records = Vec::with_capacity(table.num_rows());
        for row in 0..table.num_rows() {
            records.push(StatsRecord {
                uuid: table.text(uuid_col, row),
                m: table.float(m_col, row)?,
                md: table.float(md_col, row)?,
                chisq_peak_flux: table.float(chisq_col, row)?,
                pval: table.float(pval_col, row)?,
                mean_peak_flux: table.float(mean_col, row)?,
            });
        }

        Self::from_records(records, pval_name)
    }

    /// Index records by uuid; a uuid may appear only once
    pub fn from_records(records: Vec<StatsRecord>, pval_column: impl Into<String>) -> Result<Self> {
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if index.insert(record.uuid.clone(), i).is_some() {
                return Err(PlotError::DuplicateSource {
                    uuid: record.uuid.clone(),
                });
            }
        }

        Ok(Self {
            records,
            index,
            pval_column: pval_column.into(),
        })
    }

    pub fn get(&self, uuid: &str) -> Option<&StatsRecord> {
        self.index.get(uuid).map(|&i| &self.records[i])
    }

    /// Statistics for `uuid`, or [`PlotError::MissingStats`]
    pub fn lookup(&self, uuid: &str) -> Result<&StatsRecord> {
        self.get(uuid).ok_or_else(|| PlotError::MissingStats {
            uuid: uuid.to_string(),
        })
    }

    pub fn records(&self) -> &[StatsRecord] {
        &self.records
    }

    /// Name of the column the p-values were read from
    pub fn pval_column(&self) -> &str {
        &self.pval_column
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
