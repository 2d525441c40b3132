//! Per-source light curves.
//!
//! Builds a [`LightCurve`] for one source and renders it to
//! `{plot_dir}/{uuid}.png`, skipping sources whose plot already exists. The two
//! input paths keep their own x-axis conventions:
//!
//! * flat tables sort measurements by their parsed epoch timestamp
//!   ([`LightCurveMode::TableByDate`]), or plot by column index when the table
//!   has no epoch columns ([`LightCurveMode::TableByIndex`]);
//! * the database orders measurements by epoch number and plots either that
//!   number ([`LightCurveMode::DbByEpoch`]) or the epoch date
//!   ([`LightCurveMode::DbByDate`]).

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{PlotError, Result};
use crate::io::{DbEpochRow, FluxTable, SqliteStore, StatsTable};
use crate::model::{CurveAxis, CurvePoint, FluxRow, LightCurve, StatsRecord};
use crate::render::{light_curve_path, PlotRenderer};
use crate::schedule::{RowOutcome, ShardedJob};
use crate::time_parse::{to_plot_seconds, FlexibleParser, TimeParseError, TimeParser};

/// How a light curve's x axis is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightCurveMode {
    TableByDate,
    TableByIndex,
    DbByEpoch,
    DbByDate,
}

impl LightCurveMode {
    pub fn for_table(flux: &FluxTable) -> Self {
        if flux.has_epochs() {
            LightCurveMode::TableByDate
        } else {
            LightCurveMode::TableByIndex
        }
    }

    pub fn for_database(dates: bool) -> Self {
        if dates {
            LightCurveMode::DbByDate
        } else {
            LightCurveMode::DbByEpoch
        }
    }
}

/// Curve from a flux table row sorted by parsed epoch timestamp
///
/// The sort is stable, so measurements with equal timestamps keep their column
/// order and the result does not depend on how epoch columns are arranged.
pub fn curve_by_date(
    row: &FluxRow,
    stats: &StatsRecord,
    parser: &dyn TimeParser,
) -> Result<LightCurve> {
    let mut points = Vec::with_capacity(row.fluxes.len());
    for m in row.measurements() {
        let timestamp = parser.parse(&m.label).map_err(|source| PlotError::TimeParse {
            uuid: row.uuid.clone(),
            source,
        })?;
        points.push(CurvePoint {
            x: to_plot_seconds(&timestamp),
            flux: m.peak_flux,
            err: m.err_peak_flux,
        });
    }
    points.sort_by(|a, b| a.x.total_cmp(&b.x));

    Ok(LightCurve {
        uuid: row.uuid.clone(),
        axis: CurveAxis::Date,
        points,
        annotation: stats.annotation(),
    })
}

/// Curve from a flux table row with the epoch column index as x
pub fn curve_by_index(row: &FluxRow, stats: &StatsRecord) -> LightCurve {
    let points = row
        .fluxes
        .iter()
        .zip(&row.errors)
        .enumerate()
        .map(|(i, (&flux, &err))| CurvePoint {
            x: i as f64,
            flux,
            err,
        })
        .collect();

    LightCurve {
        uuid: row.uuid.clone(),
        axis: CurveAxis::EpochIndex,
        points,
        annotation: stats.annotation(),
    }
}

/// Curve from database rows, already ordered by epoch number
///
/// With `dates` set, x is the parsed epoch date; if any date is missing or fails
/// to parse the whole curve falls back to epoch numbers.
pub fn curve_from_db(
    uuid: &str,
    rows: &[DbEpochRow],
    stats: &StatsRecord,
    dates: bool,
    parser: &dyn TimeParser,
) -> LightCurve {
    let date_points = if dates {
        rows.iter()
            .map(|r| {
                let date = r.date.as_deref().ok_or_else(|| TimeParseError {
                    label: format!("epoch {} has no text date", r.epoch),
                    expected: "a date string".to_string(),
                })?;
                parser.parse(date).map(|dt| CurvePoint {
                    x: to_plot_seconds(&dt),
                    flux: r.peak_flux,
                    err: r.err_peak_flux,
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                warn!(
                    "{}: unknown date encountered ({}), reverting to epoch plotting",
                    uuid, e
                );
            })
            .ok()
    } else {
        None
    };

    let (axis, points) = match date_points {
        Some(points) => (CurveAxis::Date, points),
        None => (
            CurveAxis::EpochIndex,
            rows.iter()
                .map(|r| CurvePoint {
                    x: r.epoch as f64,
                    flux: r.peak_flux,
                    err: r.err_peak_flux,
                })
                .collect(),
        ),
    };

    LightCurve {
        uuid: uuid.to_string(),
        axis,
        points,
        annotation: stats.annotation(),
    }
}

/// Create the light-curve directory; must happen before any worker starts
pub fn prepare_plot_dir(plot_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(plot_dir).map_err(|e| PlotError::io(plot_dir, e))
}

/// Output path for `uuid` and whether a plot is already there
fn existing_output(plot_dir: &Path, uuid: &str) -> (PathBuf, bool) {
    let path = light_curve_path(plot_dir, uuid);
    let exists = path.exists();
    (path, exists)
}

/// Renders one light curve per flux table row
pub struct TableLightCurveJob<'a> {
    pub flux: &'a FluxTable,
    pub stats: &'a StatsTable,
    pub parser: &'a dyn TimeParser,
    pub renderer: &'a dyn PlotRenderer,
    pub plot_dir: &'a Path,
}

impl TableLightCurveJob<'_> {
    pub fn mode(&self) -> LightCurveMode {
        LightCurveMode::for_table(self.flux)
    }

    /// Build the curve for row `index` without rendering it
    pub fn build_curve(&self, index: usize) -> Result<LightCurve> {
        let row = &self.flux.rows()[index];
        let stats = self.stats.lookup(&row.uuid)?;
        match self.mode() {
            LightCurveMode::TableByIndex => Ok(curve_by_index(row, stats)),
            _ => curve_by_date(row, stats, self.parser),
        }
    }
}

impl ShardedJob for TableLightCurveJob<'_> {
    type Worker = ();

    fn row_count(&self) -> usize {
        self.flux.len()
    }

    fn open_worker(&self, _worker: usize) -> Result<()> {
        Ok(())
    }

    fn process_row(&self, _worker: &mut (), row: usize) -> Result<RowOutcome> {
        let uuid = &self.flux.rows()[row].uuid;
        let (path, exists) = existing_output(self.plot_dir, uuid);
        if exists {
            return Ok(RowOutcome::Skipped(path));
        }

        let curve = self.build_curve(row)?;
        self.renderer.render_light_curve(&curve, &path)?;
        Ok(RowOutcome::Rendered(path))
    }
}

/// Renders one light curve per database source; each worker opens its own connection
pub struct DbLightCurveJob<'a> {
    pub db_path: &'a Path,
    pub uuids: &'a [String],
    pub dates: bool,
    pub renderer: &'a dyn PlotRenderer,
    pub plot_dir: &'a Path,
}

impl DbLightCurveJob<'_> {
    pub fn mode(&self) -> LightCurveMode {
        LightCurveMode::for_database(self.dates)
    }
}

impl ShardedJob for DbLightCurveJob<'_> {
    type Worker = SqliteStore;

    fn row_count(&self) -> usize {
        self.uuids.len()
    }

    fn open_worker(&self, _worker: usize) -> Result<SqliteStore> {
        SqliteStore::open(self.db_path)
    }

    fn process_row(&self, store: &mut SqliteStore, row: usize) -> Result<RowOutcome> {
        let uuid = &self.uuids[row];
        let (path, exists) = existing_output(self.plot_dir, uuid);
        if exists {
            return Ok(RowOutcome::Skipped(path));
        }

        let rows = store.light_curve_rows(uuid)?;
        let stats = store.stats_for(uuid)?;
        let curve = curve_from_db(uuid, &rows, &stats, self.dates, &FlexibleParser);
        self.renderer.render_light_curve(&curve, &path)?;
        Ok(RowOutcome::Rendered(path))
    }
}
