//! Variability summary and light-curve plots for a transient survey.
//!
//! Two input modes:
//! - `--dbname`: an SQLite database with `sources`, `epochs` and `stats` tables
//! - `--ftable` + `--stable`: flat flux and statistics tables (CSV, TSV or FITS)
//!
//! `--plot` draws the md / p-value summary; `--all` renders one light curve per
//! source into `--lc-dir`, skipping any that already exist.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use varplot::io::{FluxTable, SqliteStore, StatsTable};
use varplot::light_curve::prepare_plot_dir;
use varplot::time_parse::{FixedFormatParser, DEFAULT_EPOCH_FORMAT};
use varplot::{
    render_summary, BatchReport, BatchScheduler, BitmapRenderer, DbLightCurveJob, PlotStyle,
    TableLightCurveJob,
};

#[derive(Parser, Debug)]
#[command(name = "plot_variables")]
#[command(about = "Create a variability plot and per-source light curves")]
#[command(version)]
#[command(group(ArgGroup::new("input").required(true).args(["dbname", "ftable"])))]
struct Args {
    /// SQLite database with sources, epochs and stats tables
    #[arg(long, conflicts_with_all = ["ftable", "stable"])]
    dbname: Option<PathBuf>,

    /// Flux table (uuid, epoch*, peak_flux*, err_peak_flux* columns)
    #[arg(long, requires = "stable")]
    ftable: Option<PathBuf>,

    /// Statistics table (uuid, m, md, chisq_peak_flux, pval, mean_peak_flux columns)
    #[arg(long, requires = "ftable")]
    stable: Option<PathBuf>,

    /// Output file for the variability summary plot
    #[arg(long)]
    plot: Option<PathBuf>,

    /// Also plot the light curve of every source
    #[arg(long)]
    all: bool,

    /// Directory for light-curve plots
    #[arg(long = "lc-dir", alias = "lc_dir", default_value = "plots")]
    lc_dir: PathBuf,

    /// Number of worker threads (default: all logical CPUs)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    cores: Option<u32>,

    /// Plot light curves against epoch date instead of epoch number
    #[arg(long, requires = "dbname")]
    dates: bool,

    /// Statistics column holding the p-value (default: auto-detect)
    #[arg(long, conflicts_with = "dbname")]
    pval_column: Option<String>,

    /// strftime format of the flux table epoch labels
    #[arg(long, default_value = DEFAULT_EPOCH_FORMAT, conflicts_with = "dbname")]
    time_format: String,

    /// JSON file overriding plot sizes, ranges and thresholds
    #[arg(long)]
    style: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let style = match &args.style {
        Some(path) => PlotStyle::load_from_file(path)
            .with_context(|| format!("Failed to load plot style {}", path.display()))?,
        None => PlotStyle::default(),
    };
    let renderer = BitmapRenderer::new(style);

    if args.plot.is_none() && !args.all {
        warn!("Neither --plot nor --all given, nothing to do");
        return Ok(());
    }

    let report = match (&args.dbname, &args.ftable, &args.stable) {
        (Some(db), _, _) => run_database(&args, db, &renderer)?,
        (None, Some(ftable), Some(stable)) => run_tables(&args, ftable, stable, &renderer)?,
        _ => bail!("Either --dbname or both --ftable and --stable are required"),
    };

    if let Some(report) = report {
        finish(&report)?;
    }
    Ok(())
}

fn run_database(args: &Args, db: &Path, renderer: &BitmapRenderer) -> Result<Option<BatchReport>> {
    let store = SqliteStore::open(db)
        .with_context(|| format!("Failed to open database {}", db.display()))?;

    if let Some(plot) = &args.plot {
        let stats = store.load_stats().context("Failed to load stats table")?;
        let summary = render_summary(&stats, &renderer.style().summary, renderer, plot)
            .with_context(|| format!("Failed to write summary plot {}", plot.display()))?;
        println!(
            "Wrote {} ({} sources, {} variable)",
            plot.display(),
            summary.points.len(),
            summary.variable_count()
        );
    }

    if !args.all {
        return Ok(None);
    }

    let uuids = store.source_uuids().context("Failed to list sources")?;
    drop(store);

    prepare_plot_dir(&args.lc_dir)?;
    let scheduler = BatchScheduler::new(args.cores.map(|n| n as usize))?;
    let job = DbLightCurveJob {
        db_path: db,
        uuids: &uuids,
        dates: args.dates,
        renderer,
        plot_dir: &args.lc_dir,
    };
    info!("Plotting {} light curves ({:?})", uuids.len(), job.mode());

    Ok(Some(scheduler.run(&job)?))
}

fn run_tables(
    args: &Args,
    ftable: &Path,
    stable: &Path,
    renderer: &BitmapRenderer,
) -> Result<Option<BatchReport>> {
    let stats = StatsTable::read(stable, args.pval_column.as_deref())
        .with_context(|| format!("Failed to read stats table {}", stable.display()))?;

    if let Some(plot) = &args.plot {
        let summary = render_summary(&stats, &renderer.style().summary, renderer, plot)
            .with_context(|| format!("Failed to write summary plot {}", plot.display()))?;
        println!(
            "Wrote {} ({} sources, {} variable)",
            plot.display(),
            summary.points.len(),
            summary.variable_count()
        );
    }

    if !args.all {
        return Ok(None);
    }

    let flux = FluxTable::read(ftable)
        .with_context(|| format!("Failed to read flux table {}", ftable.display()))?;
    let parser = FixedFormatParser::new(args.time_format.clone());

    prepare_plot_dir(&args.lc_dir)?;
    let scheduler = BatchScheduler::new(args.cores.map(|n| n as usize))?;
    let job = TableLightCurveJob {
        flux: &flux,
        stats: &stats,
        parser: &parser,
        renderer,
        plot_dir: &args.lc_dir,
    };
    info!("Plotting {} light curves ({:?})", flux.len(), job.mode());

    Ok(Some(scheduler.run(&job)?))
}

fn finish(report: &BatchReport) -> Result<()> {
    println!(
        "Light curves: {} rendered, {} skipped, {} failed",
        report.rendered(),
        report.skipped(),
        report.failed()
    );

    for failure in report.failures() {
        println!("  row {}: {}", failure.row, failure.error);
    }
    for worker in report.fatal_workers() {
        if let Some(reason) = &worker.fatal {
            println!("  worker {}: {}", worker.worker, reason);
        }
    }

    if !report.is_clean() {
        bail!(
            "{} light curves failed, {} workers aborted",
            report.failed(),
            report.fatal_workers().count()
        );
    }
    Ok(())
}
