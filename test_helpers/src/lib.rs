//! Test helpers for varplot
//!
//! Writes small survey fixtures (flux tables, statistics tables and variability
//! databases) into scratch directories so integration tests can run the full
//! load/render pipeline without real survey data.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Error type for fixture writing
#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    #[error("Fixture I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fixture CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Fixture database write failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, TestHelperError>;

/// One synthetic source: statistics plus per-epoch measurements
#[derive(Debug, Clone)]
pub struct FixtureSource {
    pub uuid: String,
    pub m: f64,
    pub md: f64,
    pub chisq_peak_flux: f64,
    pub pval: f64,
    pub mean_peak_flux: f64,
    /// `(epoch label, peak_flux, err_peak_flux)` in storage order
    pub epochs: Vec<(String, f64, f64)>,
}

impl FixtureSource {
    /// A source with `n` daily epochs starting 2020-01-01 and a gently rising flux
    pub fn daily(uuid: &str, n: usize) -> Self {
        let epochs = (0..n)
            .map(|i| {
                (
                    format!("2020-01-{:02}T00:00:00", i + 1),
                    0.01 + 0.001 * i as f64,
                    0.0005,
                )
            })
            .collect();
        Self {
            uuid: uuid.to_string(),
            m: 0.001,
            md: 0.1,
            chisq_peak_flux: 12.0,
            pval: 1e-4,
            mean_peak_flux: 0.012,
            epochs,
        }
    }

    pub fn with_epochs(mut self, epochs: &[(&str, f64, f64)]) -> Self {
        self.epochs = epochs
            .iter()
            .map(|&(label, flux, err)| (label.to_string(), flux, err))
            .collect();
        self
    }

    pub fn with_pval(mut self, pval: f64) -> Self {
        self.pval = pval;
        self
    }
}

/// Scratch directory holding fixture files; removed on drop
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Flux table with `uuid, epoch*, peak_flux*, err_peak_flux*` columns
    ///
    /// Every source must have the same number of epochs. With `with_epochs` false
    /// the `epoch*` family is left out.
    pub fn write_flux_csv(
        &self,
        name: &str,
        sources: &[FixtureSource],
        with_epochs: bool,
    ) -> Result<PathBuf> {
        let path = self.join(name);
        let mut writer = csv::Writer::from_path(&path)?;
        let n = sources.first().map_or(0, |s| s.epochs.len());

        let mut header = vec!["uuid".to_string()];
        if with_epochs {
            header.extend((0..n).map(|i| format!("epoch{i}")));
        }
        header.extend((0..n).map(|i| format!("peak_flux{i}")));
        header.extend((0..n).map(|i| format!("err_peak_flux{i}")));
        writer.write_record(&header)?;

        for source in sources {
            let mut record = vec![source.uuid.clone()];
            if with_epochs {
                record.extend(source.epochs.iter().map(|(label, _, _)| label.clone()));
            }
            record.extend(source.epochs.iter().map(|(_, flux, _)| flux.to_string()));
            record.extend(source.epochs.iter().map(|(_, _, err)| err.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(path)
    }

    /// Statistics table with the p-value stored under `pval_column`
    pub fn write_stats_csv(
        &self,
        name: &str,
        sources: &[FixtureSource],
        pval_column: &str,
    ) -> Result<PathBuf> {
        let path = self.join(name);
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record([
            "uuid",
            "m",
            "md",
            "chisq_peak_flux",
            pval_column,
            "mean_peak_flux",
        ])?;
        for s in sources {
            writer.write_record([
                s.uuid.clone(),
                s.m.to_string(),
                s.md.to_string(),
                s.chisq_peak_flux.to_string(),
                s.pval.to_string(),
                s.mean_peak_flux.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(path)
    }

    /// Variability database; epoch numbers follow each source's storage order
    /// starting at 1, and the `epochs` table takes its dates from the first source.
    pub fn write_database(&self, name: &str, sources: &[FixtureSource]) -> Result<PathBuf> {
        let path = self.join(name);
        let mut conn = rusqlite::Connection::open(&path)?;
        conn.execute_batch(
            "CREATE TABLE sources (uuid TEXT, epoch INTEGER, peak_flux REAL, err_peak_flux REAL);
             CREATE TABLE epochs (epoch INTEGER PRIMARY KEY, date TEXT);
             CREATE TABLE stats (uuid TEXT PRIMARY KEY, m REAL, md REAL, chisq_peak_flux REAL,
                                 pval_peak_flux REAL, mean_peak_flux REAL);",
        )?;

        let tx = conn.transaction()?;
        if let Some(first) = sources.first() {
            for (i, (date, _, _)) in first.epochs.iter().enumerate() {
                tx.execute(
                    "INSERT INTO epochs (epoch, date) VALUES (?1, ?2)",
                    rusqlite::params![i as i64 + 1, date],
                )?;
            }
        }
        for s in sources {
            for (i, (_, flux, err)) in s.epochs.iter().enumerate() {
                tx.execute(
                    "INSERT INTO sources (uuid, epoch, peak_flux, err_peak_flux) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![s.uuid, i as i64 + 1, flux, err],
                )?;
            }
            tx.execute(
                "INSERT INTO stats VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![s.uuid, s.m, s.md, s.chisq_peak_flux, s.pval, s.mean_peak_flux],
            )?;
        }
        tx.commit()?;
        Ok(path)
    }

    /// Create placeholder output files, e.g. to simulate an earlier partial run
    pub fn touch(&self, dir: &Path, names: &[&str]) -> Result<()> {
        fs::create_dir_all(dir)?;
        for name in names {
            fs::write(dir.join(name), b"existing")?;
        }
        Ok(())
    }
}
