//! Read-only access to a variability database.
//!
//! Expected schema:
//!
//! ```text
//! sources(uuid, epoch, peak_flux, err_peak_flux)
//! epochs(epoch, date)
//! stats(uuid, m, md, chisq_peak_flux, pval_peak_flux, mean_peak_flux)
//! ```

use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use super::tables::StatsTable;
use crate::error::{PlotError, Result};
use crate::model::StatsRecord;

/// One source measurement joined with its epoch date
#[derive(Debug, Clone, PartialEq)]
pub struct DbEpochRow {
    pub peak_flux: f64,
    pub err_peak_flux: f64,
    pub epoch: i64,
    /// Text date, `None` when the column is NULL or not text (e.g. an MJD stored as REAL)
    pub date: Option<String>,
}

/// Read-only connection to a variability database
pub struct SqliteStore {
    path: PathBuf,
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PlotError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "database not found"),
            ));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Ok(Self {
            path: path.to_path_buf(),
            conn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole `stats` table
    pub fn load_stats(&self) -> Result<StatsTable> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, m, md, chisq_peak_flux, pval_peak_flux, mean_peak_flux FROM stats",
        )?;
        let records = stmt
            .query_map([], stats_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        StatsTable::from_records(records, "pval_peak_flux")
    }

    /// Distinct source identifiers, in a stable order
    pub fn source_uuids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT uuid FROM sources ORDER BY uuid")?;
        let uuids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(uuids)
    }

    /// Measurements of one source ordered by epoch number
    pub fn light_curve_rows(&self, uuid: &str) -> Result<Vec<DbEpochRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT s.peak_flux, s.err_peak_flux, s.epoch, e.date \
             FROM sources s JOIN epochs e ON s.epoch = e.epoch \
             WHERE s.uuid = ?1 \
             ORDER BY e.epoch",
        )?;
        let rows = stmt
            .query_map(params![uuid], |row| {
                Ok(DbEpochRow {
                    peak_flux: row.get::<_, Option<f64>>(0)?.unwrap_or(f64::NAN),
                    err_peak_flux: row.get::<_, Option<f64>>(1)?.unwrap_or(f64::NAN),
                    epoch: row.get(2)?,
                    date: match row.get::<_, Value>(3)? {
                        Value::Text(date) => Some(date),
                        _ => None,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Statistics of one source, or [`PlotError::MissingStats`]
    pub fn stats_for(&self, uuid: &str) -> Result<StatsRecord> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT uuid, m, md, chisq_peak_flux, pval_peak_flux, mean_peak_flux \
             FROM stats WHERE uuid = ?1",
        )?;
        stmt.query_row(params![uuid], stats_from_row)
            .optional()?
            .ok_or_else(|| PlotError::MissingStats {
                uuid: uuid.to_string(),
            })
    }
}

fn stats_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatsRecord> {
    let float = |idx: usize| -> rusqlite::Result<f64> {
        Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
    };

    Ok(StatsRecord {
        uuid: row.get(0)?,
        m: float(1)?,
        md: float(2)?,
        chisq_peak_flux: float(3)?,
        pval: float(4)?,
        mean_peak_flux: float(5)?,
    })
}
