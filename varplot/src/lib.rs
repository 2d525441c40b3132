//! Variability plots for radio transient surveys.
//!
//! Reads per-source statistics and per-epoch flux measurements (flat tables or
//! an SQLite database), draws a summary of variability p-value against
//! modulation index, and renders one light curve per source. Light curves are
//! spread across workers with a start/stride scheduler and plots that already
//! exist are left alone, so an interrupted batch can simply be rerun.

pub mod error;
pub mod io;
pub mod light_curve;
pub mod model;
pub mod render;
pub mod schedule;
pub mod summary;
pub mod time_parse;

pub use error::{PlotError, Result};
pub use light_curve::{DbLightCurveJob, LightCurveMode, TableLightCurveJob};
pub use model::{LightCurve, StatsRecord};
pub use render::{BitmapRenderer, PlotRenderer, PlotStyle};
pub use schedule::{BatchReport, BatchScheduler};
pub use summary::{render_summary, SummaryData};
