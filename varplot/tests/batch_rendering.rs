//! End-to-end light-curve and summary runs against fixture tables and databases.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use test_helpers::{Fixture, FixtureSource};
use varplot::io::{FluxTable, SqliteStore, StatsTable};
use varplot::light_curve::prepare_plot_dir;
use varplot::model::CurveAxis;
use varplot::render::SummaryStyle;
use varplot::time_parse::FixedFormatParser;
use varplot::{
    render_summary, BatchScheduler, DbLightCurveJob, LightCurve, PlotError, PlotRenderer,
    Result, SummaryData, TableLightCurveJob,
};

/// Writes a marker file per render and remembers what it was asked to draw
#[derive(Default)]
struct RecordingRenderer {
    curves: Mutex<Vec<LightCurve>>,
    summaries: Mutex<Vec<SummaryData>>,
    fail_on: Option<String>,
}

impl RecordingRenderer {
    fn failing_on(uuid: &str) -> Self {
        Self {
            fail_on: Some(uuid.to_string()),
            ..Default::default()
        }
    }

    fn curve(&self, uuid: &str) -> LightCurve {
        self.curves
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.uuid == uuid)
            .cloned()
            .unwrap_or_else(|| panic!("{uuid} was not rendered"))
    }

    fn curve_count(&self) -> usize {
        self.curves.lock().unwrap().len()
    }
}

impl PlotRenderer for RecordingRenderer {
    fn render_light_curve(&self, curve: &LightCurve, path: &Path) -> Result<()> {
        if self.fail_on.as_deref() == Some(curve.uuid.as_str()) {
            return Err(PlotError::Drawing {
                path: path.to_path_buf(),
                message: "simulated backend failure".to_string(),
            });
        }
        fs::write(path, curve.uuid.as_bytes()).map_err(|e| PlotError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.curves.lock().unwrap().push(curve.clone());
        Ok(())
    }

    fn render_summary(&self, summary: &SummaryData, path: &Path) -> Result<()> {
        fs::write(path, b"summary").map_err(|e| PlotError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }
}

fn three_sources() -> Vec<FixtureSource> {
    vec![
        FixtureSource::daily("src-a", 4),
        FixtureSource::daily("src-b", 4),
        FixtureSource::daily("src-c", 4),
    ]
}

fn load_tables(fixture: &Fixture, sources: &[FixtureSource]) -> (FluxTable, StatsTable) {
    let flux_path = fixture.write_flux_csv("flux.csv", sources, true).unwrap();
    let stats_path = fixture
        .write_stats_csv("stats.csv", sources, "pval_peak_flux")
        .unwrap();
    (
        FluxTable::read(&flux_path).unwrap(),
        StatsTable::read(&stats_path, None).unwrap(),
    )
}

fn png_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == "png"))
        .collect();
    files.sort();
    files
}

#[test]
fn test_existing_outputs_are_skipped() {
    let fixture = Fixture::new().unwrap();
    let (flux, stats) = load_tables(&fixture, &three_sources());
    let plot_dir = fixture.join("plots");
    fixture
        .touch(&plot_dir, &["src-a.png", "src-c.png"])
        .unwrap();

    let renderer = RecordingRenderer::default();
    let parser = FixedFormatParser::default();
    let job = TableLightCurveJob {
        flux: &flux,
        stats: &stats,
        parser: &parser,
        renderer: &renderer,
        plot_dir: &plot_dir,
    };
    let report = BatchScheduler::new(Some(2)).unwrap().run(&job).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.rendered(), 1);
    assert_eq!(report.skipped(), 2);
    assert_eq!(renderer.curve_count(), 1);
    renderer.curve("src-b");
    assert_eq!(png_files(&plot_dir).len(), 3);
    // pre-existing files are untouched
    assert_eq!(fs::read(plot_dir.join("src-a.png")).unwrap(), b"existing");
}

#[test]
fn test_second_run_renders_nothing() {
    let fixture = Fixture::new().unwrap();
    let (flux, stats) = load_tables(&fixture, &three_sources());
    let plot_dir = fixture.join("plots");
    prepare_plot_dir(&plot_dir).unwrap();

    let renderer = RecordingRenderer::default();
    let parser = FixedFormatParser::default();
    let job = TableLightCurveJob {
        flux: &flux,
        stats: &stats,
        parser: &parser,
        renderer: &renderer,
        plot_dir: &plot_dir,
    };
    let scheduler = BatchScheduler::new(Some(3)).unwrap();

    let first = scheduler.run(&job).unwrap();
    assert_eq!(first.rendered(), 3);

    let second = scheduler.run(&job).unwrap();
    assert_eq!(second.rendered(), 0);
    assert_eq!(second.skipped(), 3);
    assert_eq!(renderer.curve_count(), 3);
}

#[test]
fn test_worker_count_does_not_change_output() {
    for workers in [1, 2, 5] {
        let fixture = Fixture::new().unwrap();
        let (flux, stats) = load_tables(&fixture, &three_sources());
        let plot_dir = fixture.join("plots");
        prepare_plot_dir(&plot_dir).unwrap();

        let renderer = RecordingRenderer::default();
        let parser = FixedFormatParser::default();
        let job = TableLightCurveJob {
            flux: &flux,
            stats: &stats,
            parser: &parser,
            renderer: &renderer,
            plot_dir: &plot_dir,
        };
        let report = BatchScheduler::new(Some(workers)).unwrap().run(&job).unwrap();

        assert_eq!(report.rendered(), 3, "workers = {workers}");
        assert_eq!(report.workers.len(), workers);
        assert_eq!(png_files(&plot_dir).len(), 3);
    }
}

#[test]
fn test_out_of_order_epochs_plot_chronologically() {
    let fixture = Fixture::new().unwrap();
    let source = FixtureSource::daily("shuffled", 0).with_epochs(&[
        ("2021-06-03T00:00:00", 3.0, 0.1),
        ("2021-06-01T00:00:00", 1.0, 0.1),
        ("2021-06-04T00:00:00", 4.0, 0.1),
        ("2021-06-02T00:00:00", 2.0, 0.1),
    ]);
    let (flux, stats) = load_tables(&fixture, &[source]);
    let plot_dir = fixture.join("plots");
    prepare_plot_dir(&plot_dir).unwrap();

    let renderer = RecordingRenderer::default();
    let parser = FixedFormatParser::default();
    let job = TableLightCurveJob {
        flux: &flux,
        stats: &stats,
        parser: &parser,
        renderer: &renderer,
        plot_dir: &plot_dir,
    };
    BatchScheduler::new(Some(1)).unwrap().run(&job).unwrap();

    let curve = renderer.curve("shuffled");
    assert_eq!(curve.axis, CurveAxis::Date);
    assert!(curve.points.windows(2).all(|w| w[0].x < w[1].x));
    let fluxes: Vec<f64> = curve.points.iter().map(|p| p.flux).collect();
    assert_eq!(fluxes, vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_failing_rows_are_reported_and_others_continue() {
    let fixture = Fixture::new().unwrap();
    let mut sources = three_sources();
    sources.push(FixtureSource::daily("src-d", 4));
    let (flux, stats) = load_tables(&fixture, &sources);
    // a flux row without a statistics row
    let stats = StatsTable::from_records(
        stats
            .records()
            .iter()
            .filter(|r| r.uuid != "src-c")
            .cloned()
            .collect(),
        "pval_peak_flux",
    )
    .unwrap();
    let plot_dir = fixture.join("plots");
    prepare_plot_dir(&plot_dir).unwrap();

    let renderer = RecordingRenderer::failing_on("src-a");
    let parser = FixedFormatParser::default();
    let job = TableLightCurveJob {
        flux: &flux,
        stats: &stats,
        parser: &parser,
        renderer: &renderer,
        plot_dir: &plot_dir,
    };
    // one worker so both failures land in the same shard as the good rows
    let report = BatchScheduler::new(Some(1)).unwrap().run(&job).unwrap();

    assert!(!report.is_clean());
    assert_eq!(report.failed(), 2);
    assert_eq!(report.rendered(), 2);
    let mut failed_rows: Vec<usize> = report.failures().map(|f| f.row).collect();
    failed_rows.sort();
    assert_eq!(failed_rows, vec![0, 2]);
    assert!(report
        .failures()
        .any(|f| matches!(&f.error, PlotError::MissingStats { uuid } if uuid == "src-c")));
    assert!(!plot_dir.join("src-a.png").exists());
}

#[test]
fn test_bad_epoch_label_is_a_row_failure() {
    let fixture = Fixture::new().unwrap();
    let sources = vec![
        FixtureSource::daily("good", 2),
        FixtureSource::daily("bad", 2)
            .with_epochs(&[("2020-01-01T00:00:00", 1.0, 0.1), ("not a date", 2.0, 0.1)]),
    ];
    let (flux, stats) = load_tables(&fixture, &sources);
    let plot_dir = fixture.join("plots");
    prepare_plot_dir(&plot_dir).unwrap();

    let renderer = RecordingRenderer::default();
    let parser = FixedFormatParser::default();
    let job = TableLightCurveJob {
        flux: &flux,
        stats: &stats,
        parser: &parser,
        renderer: &renderer,
        plot_dir: &plot_dir,
    };
    let report = BatchScheduler::new(Some(2)).unwrap().run(&job).unwrap();

    assert_eq!(report.rendered(), 1);
    assert_eq!(report.failed(), 1);
    let failure = report.failures().next().unwrap();
    assert!(matches!(&failure.error, PlotError::TimeParse { uuid, .. } if uuid == "bad"));
}

#[test]
fn test_table_without_epochs_plots_by_index() {
    let fixture = Fixture::new().unwrap();
    let sources = vec![FixtureSource::daily("idx", 3)];
    let flux_path = fixture.write_flux_csv("flux.csv", &sources, false).unwrap();
    let stats_path = fixture
        .write_stats_csv("stats.csv", &sources, "pval_peak_flux_ks")
        .unwrap();
    let flux = FluxTable::read(&flux_path).unwrap();
    let stats = StatsTable::read(&stats_path, None).unwrap();
    assert_eq!(stats.pval_column(), "pval_peak_flux_ks");

    let plot_dir = fixture.join("plots");
    prepare_plot_dir(&plot_dir).unwrap();
    let renderer = RecordingRenderer::default();
    let parser = FixedFormatParser::default();
    let job = TableLightCurveJob {
        flux: &flux,
        stats: &stats,
        parser: &parser,
        renderer: &renderer,
        plot_dir: &plot_dir,
    };
    BatchScheduler::new(Some(1)).unwrap().run(&job).unwrap();

    let curve = renderer.curve("idx");
    assert_eq!(curve.axis, CurveAxis::EpochIndex);
    let xs: Vec<f64> = curve.points.iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![0.0, 1.0, 2.0]);
}

#[test]
fn test_database_light_curves() {
    let fixture = Fixture::new().unwrap();
    let db = fixture.write_database("var.db", &three_sources()).unwrap();
    let uuids = SqliteStore::open(&db).unwrap().source_uuids().unwrap();
    assert_eq!(uuids, vec!["src-a", "src-b", "src-c"]);

    let plot_dir = fixture.join("plots");
    prepare_plot_dir(&plot_dir).unwrap();
    let renderer = RecordingRenderer::default();
    let job = DbLightCurveJob {
        db_path: &db,
        uuids: &uuids,
        dates: false,
        renderer: &renderer,
        plot_dir: &plot_dir,
    };
    let report = BatchScheduler::new(Some(2)).unwrap().run(&job).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.rendered(), 3);
    let curve = renderer.curve("src-b");
    assert_eq!(curve.axis, CurveAxis::EpochIndex);
    let xs: Vec<f64> = curve.points.iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_database_dates_fall_back_to_epochs() {
    let fixture = Fixture::new().unwrap();
    let dated = FixtureSource::daily("dated", 0).with_epochs(&[
        ("2020-01-01T00:00:00", 1.0, 0.1),
        ("2020-01-02 12:00:00", 2.0, 0.1),
    ]);
    let db = fixture.write_database("dated.db", &[dated]).unwrap();
    let undated = FixtureSource::daily("undated", 0)
        .with_epochs(&[("2020-01-01", 1.0, 0.1), ("sometime", 2.0, 0.1)]);
    let bad_db = fixture.write_database("undated.db", &[undated]).unwrap();

    let plot_dir = fixture.join("plots");
    prepare_plot_dir(&plot_dir).unwrap();
    let renderer = RecordingRenderer::default();

    for (db, uuid) in [(&db, "dated"), (&bad_db, "undated")] {
        let uuids = vec![uuid.to_string()];
        let job = DbLightCurveJob {
            db_path: db,
            uuids: &uuids,
            dates: true,
            renderer: &renderer,
            plot_dir: &plot_dir,
        };
        let report = BatchScheduler::new(Some(1)).unwrap().run(&job).unwrap();
        assert!(report.is_clean());
    }

    assert_eq!(renderer.curve("dated").axis, CurveAxis::Date);
    assert_eq!(renderer.curve("undated").axis, CurveAxis::EpochIndex);
}

#[test]
fn test_missing_database_is_fatal_for_workers() {
    let fixture = Fixture::new().unwrap();
    let missing = fixture.join("nope.db");
    let uuids = vec!["a".to_string(), "b".to_string()];
    let plot_dir = fixture.join("plots");
    prepare_plot_dir(&plot_dir).unwrap();
    let renderer = RecordingRenderer::default();
    let job = DbLightCurveJob {
        db_path: &missing,
        uuids: &uuids,
        dates: false,
        renderer: &renderer,
        plot_dir: &plot_dir,
    };
    let report = BatchScheduler::new(Some(2)).unwrap().run(&job).unwrap();

    assert!(!report.is_clean());
    assert_eq!(report.fatal_workers().count(), 2);
    assert_eq!(report.rendered(), 0);
}

#[test]
fn test_summary_uses_only_positive_pvalues() {
    let fixture = Fixture::new().unwrap();
    let sources: Vec<FixtureSource> = [0.5, -1.0, 0.001, 0.0]
        .iter()
        .enumerate()
        .map(|(i, &p)| FixtureSource::daily(&format!("s{i}"), 2).with_pval(p))
        .collect();
    let stats_path = fixture
        .write_stats_csv("stats.csv", &sources, "pval_peak_flux")
        .unwrap();
    let stats = StatsTable::read(&stats_path, None).unwrap();

    let renderer = RecordingRenderer::default();
    let out = fixture.join("nested/summary.png");
    let summary =
        render_summary(&stats, &SummaryStyle::default(), &renderer, &out).unwrap();

    assert!(out.exists());
    let kept: Vec<&str> = summary.points.iter().map(|p| p.uuid.as_str()).collect();
    assert_eq!(kept, vec!["s0", "s2"]);
    assert_eq!(summary.excluded, 2);
    assert_eq!(renderer.summaries.lock().unwrap().len(), 1);
}

#[test]
fn test_database_summary() {
    let fixture = Fixture::new().unwrap();
    let db = fixture.write_database("var.db", &three_sources()).unwrap();
    let stats = SqliteStore::open(&db).unwrap().load_stats().unwrap();
    assert_eq!(stats.len(), 3);

    let renderer = RecordingRenderer::default();
    let summary = render_summary(
        &stats,
        &SummaryStyle::default(),
        &renderer,
        &fixture.join("summary.png"),
    )
    .unwrap();
    assert_eq!(summary.points.len(), 3);
    // daily fixtures: pval 1e-4 and md 0.1
    assert_eq!(summary.variable_count(), 3);
}

#[test]
fn test_database_null_and_numeric_dates() {
    let fixture = Fixture::new().unwrap();
    let db = fixture
        .write_database("mjd.db", &[FixtureSource::daily("mjd", 3)])
        .unwrap();
    {
        let conn = rusqlite::Connection::open(&db).unwrap();
        conn.execute_batch(
            "UPDATE epochs SET date = NULL WHERE epoch = 1;
             UPDATE epochs SET date = 58000.5 WHERE epoch = 2;",
        )
        .unwrap();
    }
    let uuids = vec!["mjd".to_string()];

    for dates in [false, true] {
        let plot_dir = fixture.join(if dates { "by_date" } else { "by_epoch" });
        prepare_plot_dir(&plot_dir).unwrap();
        let renderer = RecordingRenderer::default();
        let job = DbLightCurveJob {
            db_path: &db,
            uuids: &uuids,
            dates,
            renderer: &renderer,
            plot_dir: &plot_dir,
        };
        let report = BatchScheduler::new(Some(1)).unwrap().run(&job).unwrap();

        assert!(report.is_clean(), "dates = {dates}");
        assert_eq!(report.rendered(), 1);
        let curve = renderer.curve("mjd");
        assert_eq!(curve.axis, CurveAxis::EpochIndex);
        let xs: Vec<f64> = curve.points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
    }
}
