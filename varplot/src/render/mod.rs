//! Rendering context for light curves and the variability summary.
//!
//! All drawing goes through a [`PlotRenderer`] passed explicitly to the code that
//! needs it. [`BitmapRenderer`] writes PNG files with plotters; tests substitute
//! their own implementations.

pub mod bitmap;
pub mod colormap;
pub mod style;

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::LightCurve;
use crate::summary::SummaryData;

pub use bitmap::BitmapRenderer;
pub use colormap::Colormap;
pub use style::{LightCurveStyle, PlotStyle, SummaryStyle};

/// Something that can turn curves and summaries into image files
pub trait PlotRenderer: Sync {
    fn render_light_curve(&self, curve: &LightCurve, path: &Path) -> Result<()>;

    fn render_summary(&self, summary: &SummaryData, path: &Path) -> Result<()>;
}

/// Output location of a source's light curve: `{plot_dir}/{uuid}.png`
pub fn light_curve_path(plot_dir: &Path, uuid: &str) -> PathBuf {
    plot_dir.join(format!("{uuid}.png"))
}
